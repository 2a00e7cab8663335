//! Outbound messages to the device
//!
//! The device understands a fixed set of single-key frames. Delivery is
//! fire-and-forget: the relay never learns whether a frame arrived.

use crate::conversation::truncate_at_char_boundary;
use crate::relay::{DeliveryMode, StreamEvent};
use crate::settings::{is_ready, SettingsStore};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Room for text in one frame; the device inbox is 4096 bytes including keys
pub const MAX_FRAME_TEXT_BYTES: usize = 4000;

/// Frame keys understood by the device
pub const READY_STATUS: &str = "READY_STATUS";
pub const RESPONSE_CHUNK: &str = "RESPONSE_CHUNK";
pub const RESPONSE_TEXT: &str = "RESPONSE_TEXT";
pub const RESPONSE_END: &str = "RESPONSE_END";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    ReadyStatus(bool),
    /// Streaming deployments
    ResponseChunk(String),
    /// Non-streaming deployments
    ResponseText(String),
    ResponseEnd,
}

impl OutboundMessage {
    pub fn key(&self) -> &'static str {
        match self {
            OutboundMessage::ReadyStatus(_) => READY_STATUS,
            OutboundMessage::ResponseChunk(_) => RESPONSE_CHUNK,
            OutboundMessage::ResponseText(_) => RESPONSE_TEXT,
            OutboundMessage::ResponseEnd => RESPONSE_END,
        }
    }

    /// Key/value frame as sent on the wire
    pub fn to_frame(&self) -> Value {
        let value = match self {
            OutboundMessage::ReadyStatus(ready) => json!(u8::from(*ready)),
            OutboundMessage::ResponseChunk(text) | OutboundMessage::ResponseText(text) => {
                json!(text)
            }
            OutboundMessage::ResponseEnd => json!(1),
        };
        let mut frame = serde_json::Map::new();
        frame.insert(self.key().to_string(), value);
        Value::Object(frame)
    }

    /// Frames for one relay event. Long text is split across several frames.
    pub fn from_event(event: StreamEvent, mode: DeliveryMode) -> Vec<Self> {
        match event {
            StreamEvent::Ready(ready) => vec![OutboundMessage::ReadyStatus(ready)],
            StreamEvent::End => vec![OutboundMessage::ResponseEnd],
            StreamEvent::Chunk(text) => split_text(&text, MAX_FRAME_TEXT_BYTES)
                .into_iter()
                .map(|part| match mode {
                    DeliveryMode::Streaming => OutboundMessage::ResponseChunk(part.to_string()),
                    DeliveryMode::Buffered => OutboundMessage::ResponseText(part.to_string()),
                })
                .collect(),
        }
    }
}

/// Split text into pieces of at most `max_bytes`, on character boundaries
fn split_text(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut part = truncate_at_char_boundary(rest, max_bytes);
        if part.is_empty() {
            // max_bytes smaller than one character: send the character whole
            let width = rest.chars().next().map_or(rest.len(), char::len_utf8);
            part = rest.split_at(width).0;
        }
        parts.push(part);
        rest = rest.split_at(part.len()).1;
    }
    parts
}

/// Readiness frame, sent when a device connects and after every settings update
pub fn ready_status(store: &dyn SettingsStore) -> OutboundMessage {
    let event = StreamEvent::Ready(is_ready(store));
    // Readiness always maps to exactly one frame
    OutboundMessage::from_event(event, DeliveryMode::Streaming)
        .pop()
        .unwrap_or(OutboundMessage::ReadyStatus(false))
}

/// Channel toward the device
pub trait MessageSink: Send + Sync {
    fn send(&self, message: OutboundMessage);
}

/// Translate relay events into frames and hand them to the sink
pub fn deliver(sink: &dyn MessageSink, mode: DeliveryMode, events: Vec<StreamEvent>) {
    for event in events {
        for message in OutboundMessage::from_event(event, mode) {
            tracing::debug!(key = message.key(), "Sending frame");
            sink.send(message);
        }
    }
}

/// Sink backed by an unbounded channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { tx }
    }
}

impl MessageSink for ChannelSink {
    fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Device channel closed, dropping frame");
        }
    }
}
