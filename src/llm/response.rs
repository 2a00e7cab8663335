//! Non-streaming response decoding

use super::RelayError;
use serde::Deserialize;

/// Sent when a complete response carries no text
pub const NO_RESPONSE_PLACEHOLDER: &str = "(No response)";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ServerToolUse,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Concatenate the text blocks of a complete response.
///
/// A server tool call between text blocks becomes a paragraph break. Returns
/// `Ok(None)` when there is no text to show.
pub fn assemble_text(body: &[u8]) -> Result<Option<String>, RelayError> {
    let response: MessagesResponse = serde_json::from_slice(body)
        .map_err(|e| RelayError::malformed_payload(format!("unparseable response body: {e}")))?;

    let mut text = String::new();
    let mut has_text = false;
    for block in response.content {
        match block {
            ResponseBlock::Text { text: t } => {
                has_text = true;
                text.push_str(&t);
            }
            ResponseBlock::ServerToolUse => text.push_str("\n\n"),
            ResponseBlock::Other => {}
        }
    }

    let trimmed = text.trim();
    if !has_text || trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

/// Human-readable description of a failed HTTP exchange
pub fn describe_http_error(status: u16, body: &[u8]) -> RelayError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            RelayError::transport(format!("HTTP {status}: {}", envelope.error.message))
        }
        _ => RelayError::transport(format!("HTTP {status}")),
    }
}
