//! Relay error types

use thiserror::Error;

/// Relay error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RelayError {
    pub kind: RelayErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::MissingCredential, message)
    }

    pub fn malformed_connectors(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::MalformedConnectorConfig, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::Transport, message)
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::MalformedUpstreamPayload, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::Busy, message)
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transport("request timed out")
        } else if e.is_connect() {
            Self::transport(format!("network error (connection failed: {e})"))
        } else {
            Self::transport(format!("network error ({e})"))
        }
    }

    /// Text shown on the device when the failure is surfaced
    pub fn display_text(&self) -> String {
        format!("Error: {}", self.message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    /// No API key configured - request never leaves the relay
    MissingCredential,
    /// Connector list (or one entry) is unusable - degrade to fewer connectors
    MalformedConnectorConfig,
    /// Network failure, non-2xx status, timeout
    Transport,
    /// Bad JSON in one SSE line or one full body
    MalformedUpstreamPayload,
    /// A relay is already in flight
    Busy,
}

impl RelayErrorKind {
    /// Recovered locally and only logged
    #[allow(dead_code)] // Used in tests
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::MalformedConnectorConfig | Self::MalformedUpstreamPayload
        )
    }

    /// Ends the relay: surfaced to the device, followed by `End`
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::MissingCredential | Self::Transport)
    }
}
