//! API request and response types

use serde::{Deserialize, Serialize};

/// Chat trigger sent by the device
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Encoded conversation (`[U]...[A]...`)
    #[serde(rename = "REQUEST_CHAT")]
    pub request_chat: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
