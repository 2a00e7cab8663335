//! Test doubles for the runtime
//!
//! A recording sink, an in-memory settings store and a scripted upstream
//! server speaking just enough HTTP/1.1 for reqwest.

use crate::settings::{SettingsStore, StoreError};
use crate::sink::{MessageSink, OutboundMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ============================================================================
// Recording sink
// ============================================================================

/// Sink that keeps every frame in order
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<OutboundMessage> {
        self.frames.lock().unwrap().clone()
    }

    /// All chunk and text payloads joined
    pub fn text(&self) -> String {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundMessage::ResponseChunk(text) | OutboundMessage::ResponseText(text) => {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    pub fn end_count(&self) -> usize {
        self.frames()
            .iter()
            .filter(|frame| **frame == OutboundMessage::ResponseEnd)
            .count()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: OutboundMessage) {
        self.frames.lock().unwrap().push(message);
    }
}

// ============================================================================
// In-memory settings
// ============================================================================

#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let store = Self::default();
        for (key, value) in pairs {
            store.insert(key, value);
        }
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Scripted upstream
// ============================================================================

/// How the upstream answers every request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Close-delimited body written in parts, pausing between them
    Respond {
        status: u16,
        content_type: &'static str,
        parts: Vec<Vec<u8>>,
        pause: Duration,
    },
    /// Read the request and never answer
    Hang,
}

impl Reply {
    pub fn json(status: u16, body: &Value) -> Self {
        Reply::Respond {
            status,
            content_type: "application/json",
            parts: vec![body.to_string().into_bytes()],
            pause: Duration::ZERO,
        }
    }

    pub fn stream(status: u16, parts: Vec<Vec<u8>>) -> Self {
        Reply::Respond {
            status,
            content_type: "text/event-stream",
            parts,
            pause: Duration::from_millis(20),
        }
    }
}

/// A request as the upstream saw it
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub struct UpstreamServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl UpstreamServer {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let captured = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept = listener.accept() => {
                        if let Ok((socket, _)) = accept {
                            let reply = reply.clone();
                            let captured = Arc::clone(&captured);
                            tokio::spawn(async move {
                                serve(socket, reply, captured).await;
                            });
                        }
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown: shutdown_tx,
            handle,
        }
    }

    /// Messages endpoint on this server
    pub fn url(&self) -> String {
        format!("http://{}/v1/messages", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn serve(mut socket: TcpStream, reply: Reply, captured: Arc<Mutex<Vec<CapturedRequest>>>) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    captured.lock().unwrap().push(request);

    match reply {
        Reply::Hang => std::future::pending::<()>().await,
        Reply::Respond {
            status,
            content_type,
            parts,
            pause,
        } => {
            let head = format!(
                "HTTP/1.1 {status} Scripted\r\n\
                 Content-Type: {content_type}\r\n\
                 Connection: close\r\n\
                 \r\n"
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for part in parts {
                if socket.write_all(&part).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            let _ = socket.shutdown().await;
        }
    }
}

/// Read the head and a `Content-Length` body
async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut request = CapturedRequest {
        head,
        body: buf[head_end + 4..].to_vec(),
    };
    let length: usize = request
        .header("content-length")
        .and_then(|l| l.parse().ok())
        .unwrap_or(0);

    while request.body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        request.body.extend_from_slice(&chunk[..n]);
    }
    Some(request)
}

/// A URL nothing is listening on
pub fn unused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1/messages")
}
