//! Anthropic Messages API plumbing
//!
//! Request shaping, response decoding and the error taxonomy shared by the
//! relay.

mod error;
mod request;
mod response;

pub use error::{RelayError, RelayErrorKind};
#[allow(unused_imports)] // Public API re-exports
pub use request::{
    build_request, request_headers, McpServer, RequestBody, ToolSpec, ANTHROPIC_VERSION,
    CONNECTOR_BETA, MAX_OUTPUT_TOKENS,
};
pub use response::{assemble_text, describe_http_error, NO_RESPONSE_PLACEHOLDER};
