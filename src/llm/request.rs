//! Outbound request shaping

use super::RelayError;
use crate::connectors::ConnectorSpec;
use crate::conversation::Turn;
use crate::settings::EffectiveSettings;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

/// Output bound sized for a watch screen
pub const MAX_OUTPUT_TOKENS: u32 = 256;
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Capability flag required when `mcp_servers` is present
pub const CONNECTOR_BETA: &str = "mcp-client-2025-04-04";

const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";
const WEB_SEARCH_MAX_USES: u32 = 5;

/// Messages API request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Turn>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServer>,
}

impl RequestBody {
    /// Whether the connector capability header must accompany this body
    pub fn uses_connectors(&self) -> bool {
        !self.mcp_servers.is_empty()
    }
}

/// Server-side tool descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub max_uses: u32,
}

impl ToolSpec {
    pub fn web_search() -> Self {
        Self {
            tool_type: WEB_SEARCH_TOOL_TYPE.to_string(),
            name: "web_search".to_string(),
            max_uses: WEB_SEARCH_MAX_USES,
        }
    }
}

/// Connector entry in the `mcp_servers` block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpServer {
    #[serde(rename = "type")]
    pub server_type: String,
    pub url: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
}

impl McpServer {
    fn from_connector(index: usize, connector: &ConnectorSpec) -> Self {
        let authorization_token = connector
            .header("authorization")
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string())
            .filter(|token| !token.is_empty());

        Self {
            server_type: "url".to_string(),
            url: connector.url.clone(),
            name: format!("connector-{}", index + 1),
            authorization_token,
        }
    }
}

/// Assemble the request body. Pure: no I/O, no logging.
pub fn build_request(
    settings: &EffectiveSettings,
    turns: &[Turn],
    connectors: &[ConnectorSpec],
) -> RequestBody {
    let system = settings
        .system_message
        .as_ref()
        .filter(|s| !s.is_empty())
        .cloned();

    let tools = if settings.web_search_enabled {
        vec![ToolSpec::web_search()]
    } else {
        Vec::new()
    };

    let mcp_servers = connectors
        .iter()
        .enumerate()
        .map(|(index, connector)| McpServer::from_connector(index, connector))
        .collect();

    RequestBody {
        model: settings.model.clone(),
        max_tokens: MAX_OUTPUT_TOKENS,
        messages: turns.to_vec(),
        stream: settings.streaming_enabled,
        system,
        tools,
        mcp_servers,
    }
}

/// Headers for the upstream call
pub fn request_headers(api_key: &str, body: &RequestBody) -> Result<HeaderMap, RelayError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "x-api-key",
        HeaderValue::from_str(api_key)
            .map_err(|_| RelayError::transport("API key contains invalid header characters"))?,
    );
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    if body.uses_connectors() {
        headers.insert("anthropic-beta", HeaderValue::from_static(CONNECTOR_BETA));
    }
    Ok(headers)
}
