//! Relay executor
//!
//! Owns the HTTP client and the in-flight gate. Each run reads settings once,
//! dispatches the request and feeds transport progress into a [`Relay`].

use crate::config::RelayConfig;
use crate::conversation;
use crate::llm::{build_request, request_headers, RelayError};
use crate::relay::{DeliveryMode, Relay, RelayInput};
use crate::settings::{load_effective, resolve, PersistedSettings, SettingsDefaults, SettingsStore};
use crate::sink::{deliver, MessageSink};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Proof that the caller holds the single in-flight slot. Released on drop.
#[derive(Debug)]
pub struct RelayPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for RelayPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

pub struct RelayRuntime {
    client: Client,
    store: Arc<dyn SettingsStore>,
    defaults: SettingsDefaults,
    request_timeout: Duration,
    in_flight: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl RelayRuntime {
    pub fn new(store: Arc<dyn SettingsStore>, config: &RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RelayError::transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, store, config))
    }

    /// Runtime whose client ignores proxy settings, for talking to local test servers
    #[cfg(test)]
    pub fn direct(store: Arc<dyn SettingsStore>, config: &RelayConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .no_proxy()
            .build()
            .unwrap();
        Self::with_client(client, store, config)
    }

    fn with_client(client: Client, store: Arc<dyn SettingsStore>, config: &RelayConfig) -> Self {
        Self {
            client,
            store,
            defaults: SettingsDefaults::for_deployment(config.streaming_default),
            request_timeout: config.request_timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Cancelling this token abandons the in-flight request
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Claim the in-flight slot, failing if a relay is already running
    pub fn try_begin(&self) -> Result<RelayPermit, RelayError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RelayError::busy("a relay is already in flight"))?;
        Ok(RelayPermit {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Relay one encoded conversation. The sink always receives exactly one end frame.
    pub async fn run(&self, permit: RelayPermit, encoded: &str, sink: &dyn MessageSink) {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("relay", %request_id);
        self.relay(encoded, sink).instrument(span).await;
        drop(permit);
    }

    async fn relay(&self, encoded: &str, sink: &dyn MessageSink) {
        let settings = match load_effective(self.store.as_ref(), &self.defaults) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read settings, using defaults");
                resolve(&PersistedSettings::default(), &self.defaults).settings
            }
        };

        let mode = DeliveryMode::from_streaming(settings.streaming_enabled);
        let mut relay = Relay::new(mode);

        let Some(api_key) = settings.api_key.as_deref() else {
            tracing::warn!("No API key configured");
            deliver(sink, mode, relay.handle(RelayInput::CredentialMissing));
            return;
        };

        let turns = conversation::decode(encoded);
        let body = build_request(&settings, &turns, &settings.connectors);
        tracing::info!(
            turns = turns.len(),
            model = %settings.model,
            streaming = settings.streaming_enabled,
            web_search = settings.web_search_enabled,
            connectors = settings.connectors.len(),
            "Sending request"
        );

        match request_headers(api_key, &body) {
            Ok(headers) => {
                let request = self.client.post(&settings.base_url).headers(headers).json(&body);
                deliver(sink, mode, relay.handle(RelayInput::Dispatched));
                self.exchange_bounded(&mut relay, request, sink).await;
            }
            Err(e) => deliver(
                sink,
                mode,
                relay.handle(RelayInput::NetworkError { message: e.message }),
            ),
        }

        deliver(sink, mode, relay.ensure_ended());
    }

    /// Run the exchange, racing it against the timeout (non-streaming only) and shutdown
    async fn exchange_bounded(
        &self,
        relay: &mut Relay,
        request: RequestBuilder,
        sink: &dyn MessageSink,
    ) {
        let mode = relay.mode();
        let limit = match mode {
            DeliveryMode::Buffered => Some(self.request_timeout),
            DeliveryMode::Streaming => None,
        };
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let interrupted = tokio::select! {
            biased;

            () = self.shutdown.cancelled() => Some(RelayInput::NetworkError {
                message: "relay shut down".to_string(),
            }),
            () = deadline => Some(RelayInput::TimedOut),
            () = exchange(relay, request, sink) => None,
        };

        // The in-flight call was dropped with the select
        if let Some(input) = interrupted {
            tracing::warn!(?input, "Abandoned in-flight request");
            deliver(sink, mode, relay.handle(input));
        }
    }
}

/// Send the request and feed headers, body bytes and completion into the relay
async fn exchange(relay: &mut Relay, request: RequestBuilder, sink: &dyn MessageSink) {
    let mode = relay.mode();

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let error = RelayError::from_reqwest(&e);
            deliver(
                sink,
                mode,
                relay.handle(RelayInput::NetworkError { message: error.message }),
            );
            return;
        }
    };

    let status = response.status().as_u16();
    tracing::debug!(status, "Headers received");
    deliver(sink, mode, relay.handle(RelayInput::HeadersReceived { status }));
    if relay.is_terminal() {
        return;
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let input = match chunk {
            Ok(bytes) => RelayInput::BodyReceived {
                bytes: bytes.to_vec(),
            },
            Err(e) => RelayInput::NetworkError {
                message: RelayError::from_reqwest(&e).message,
            },
        };
        deliver(sink, mode, relay.handle(input));
        if relay.is_terminal() {
            return;
        }
    }

    deliver(sink, mode, relay.handle(RelayInput::LoadComplete));
}
