//! Inputs and outputs of the relay state machine

/// Events delivered toward the device. The only vocabulary the sink ever sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Readiness, produced by the separate readiness notifier
    Ready(bool),
    Chunk(String),
    End,
}

/// Transport and precondition inputs that advance the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayInput {
    /// No API key resolvable; nothing will be sent
    CredentialMissing,
    /// HTTP request handed to the transport
    Dispatched,
    HeadersReceived { status: u16 },
    /// Newly arrived response bytes (never bytes already delivered)
    BodyReceived { bytes: Vec<u8> },
    LoadComplete,
    NetworkError { message: String },
    TimedOut,
}
