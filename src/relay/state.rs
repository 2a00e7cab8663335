//! Relay state types

use super::sse::SseDecoder;

/// How the response is requested and delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// SSE response relayed as many small chunks
    Streaming,
    /// One JSON response relayed as a single text message
    Buffered,
}

impl DeliveryMode {
    pub fn from_streaming(streaming_enabled: bool) -> Self {
        if streaming_enabled {
            DeliveryMode::Streaming
        } else {
            DeliveryMode::Buffered
        }
    }
}

/// Fixed for the lifetime of one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayContext {
    pub mode: DeliveryMode,
}

impl RelayContext {
    pub fn new(mode: DeliveryMode) -> Self {
        Self { mode }
    }
}

/// Response received so far, and how much of it has been decoded
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BodyProgress {
    /// `None` until headers arrive
    pub status: Option<u16>,
    pub body: Vec<u8>,
    pub decoder: SseDecoder,
}

impl BodyProgress {
    pub fn with_status(status: Option<u16>) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..300).contains(&s))
    }
}

impl std::fmt::Debug for BodyProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyProgress")
            .field("status", &self.status)
            .field("received", &self.body.len())
            .field("processed", &self.decoder.processed())
            .finish()
    }
}

/// Relay state. `Done` and `Failed` are absorbing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelayState {
    #[default]
    Idle,
    AwaitingHeaders,
    StreamingBody(BodyProgress),
    Done,
    Failed,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Done | RelayState::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RelayState::Idle => "idle",
            RelayState::AwaitingHeaders => "awaiting_headers",
            RelayState::StreamingBody(_) => "streaming_body",
            RelayState::Done => "done",
            RelayState::Failed => "failed",
        }
    }
}
