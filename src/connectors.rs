//! Validation of user-declared tool connectors
//!
//! Connectors arrive as a JSON-encoded array in persisted settings. Each entry
//! is checked on its own; a bad entry is dropped without affecting the others.

use crate::llm::RelayError;
use serde_json::Value;
use std::collections::BTreeMap;

/// A remote tool endpoint the model may call during generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSpec {
    pub url: String,
    pub headers: Option<BTreeMap<String, String>>,
}

impl ConnectorSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: None,
        }
    }

    #[allow(dead_code)] // Builder used by tests and callers that assemble connectors by hand
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of validating the persisted connector list
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConnectorValidation {
    pub connectors: Vec<ConnectorSpec>,
    /// The stored value is unparseable and should be erased
    pub discard: bool,
}

/// Validate the raw persisted connector configuration.
///
/// Unparseable JSON sets `discard`. Parseable JSON that is not an array is
/// ignored but left in place so it can be corrected from the settings page.
pub fn validate(raw: Option<&str>) -> ConnectorValidation {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return ConnectorValidation::default();
    };

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            let error = RelayError::malformed_connectors(format!("unparseable connector list: {e}"));
            tracing::warn!(error = %error, "Discarding connector configuration");
            return ConnectorValidation {
                connectors: Vec::new(),
                discard: true,
            };
        }
    };

    let Value::Array(entries) = parsed else {
        tracing::warn!("Connector configuration is not an array, ignoring");
        return ConnectorValidation::default();
    };

    let connectors: Vec<ConnectorSpec> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match parse_connector(entry) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping invalid connector");
                None
            }
        })
        .collect();

    tracing::debug!(
        declared = entries.len(),
        accepted = connectors.len(),
        "Validated connectors"
    );

    ConnectorValidation {
        connectors,
        discard: false,
    }
}

/// Check a single array entry
fn parse_connector(entry: &Value) -> Result<ConnectorSpec, RelayError> {
    let Value::Object(fields) = entry else {
        return Err(RelayError::malformed_connectors("entry is not an object"));
    };

    let url = match fields.get("url") {
        Some(Value::String(url)) if !url.is_empty() => url,
        _ => return Err(RelayError::malformed_connectors("missing url")),
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(RelayError::malformed_connectors(format!(
            "unsupported url scheme: {url}"
        )));
    }

    let headers = match fields.get("headers") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => {
            let mut headers = BTreeMap::new();
            for (name, value) in map {
                let Value::String(value) = value else {
                    return Err(RelayError::malformed_connectors(format!(
                        "header {name} is not a string"
                    )));
                };
                headers.insert(name.clone(), value.clone());
            }
            Some(headers)
        }
        Some(_) => {
            return Err(RelayError::malformed_connectors(
                "headers must be an object of strings",
            ))
        }
    };

    Ok(ConnectorSpec {
        url: url.clone(),
        headers,
    })
}
