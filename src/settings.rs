//! Effective settings for one relay request
//!
//! Persisted values are read once per request and merged field by field with
//! built-in defaults into an immutable [`EffectiveSettings`].

mod store;

pub use store::{SettingsStore, SqliteSettingsStore, StoreError};

use crate::connectors::{self, ConnectorSpec};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You're running on a Pebble smartwatch. Please respond in plain text without any formatting, keeping your responses within 1-3 sentences.";

/// Persisted setting keys
pub mod keys {
    pub const API_KEY: &str = "api_key";
    pub const BASE_URL: &str = "base_url";
    pub const MODEL: &str = "model";
    pub const SYSTEM_MESSAGE: &str = "system_message";
    pub const WEB_SEARCH_ENABLED: &str = "web_search_enabled";
    pub const STREAMING_ENABLED: &str = "streaming_enabled";
    pub const CONNECTORS: &str = "connectors";

    pub const ALL: [&str; 7] = [
        API_KEY,
        BASE_URL,
        MODEL,
        SYSTEM_MESSAGE,
        WEB_SEARCH_ENABLED,
        STREAMING_ENABLED,
        CONNECTORS,
    ];
}

/// Raw values as stored, before defaults are applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub system_message: Option<String>,
    pub web_search_enabled: Option<String>,
    pub streaming_enabled: Option<String>,
    pub connectors: Option<String>,
}

impl PersistedSettings {
    pub fn load(store: &dyn SettingsStore) -> Result<Self, StoreError> {
        Ok(Self {
            api_key: store.get(keys::API_KEY)?,
            base_url: store.get(keys::BASE_URL)?,
            model: store.get(keys::MODEL)?,
            system_message: store.get(keys::SYSTEM_MESSAGE)?,
            web_search_enabled: store.get(keys::WEB_SEARCH_ENABLED)?,
            streaming_enabled: store.get(keys::STREAMING_ENABLED)?,
            connectors: store.get(keys::CONNECTORS)?,
        })
    }
}

/// Built-in fallbacks. Streaming is fixed per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDefaults {
    pub base_url: String,
    pub model: String,
    pub system_message: Option<String>,
    pub streaming_enabled: bool,
}

impl SettingsDefaults {
    pub fn for_deployment(streaming_enabled: bool) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_message: Some(DEFAULT_SYSTEM_MESSAGE.to_string()),
            streaming_enabled,
        }
    }
}

/// Settings used for exactly one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub system_message: Option<String>,
    pub web_search_enabled: bool,
    pub streaming_enabled: bool,
    pub connectors: Vec<ConnectorSpec>,
}

/// Result of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub settings: EffectiveSettings,
    /// The stored connector list could not be parsed and should be erased
    pub discard_connectors: bool,
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.is_empty())
}

fn parse_flag(value: Option<&String>) -> Option<bool> {
    match non_empty(value)?.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Merge persisted values with defaults. Pure.
pub fn resolve(persisted: &PersistedSettings, defaults: &SettingsDefaults) -> Resolution {
    let api_key = persisted
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from);

    let validation = connectors::validate(persisted.connectors.as_deref());

    let settings = EffectiveSettings {
        api_key,
        base_url: non_empty(persisted.base_url.as_ref())
            .cloned()
            .unwrap_or_else(|| defaults.base_url.clone()),
        model: non_empty(persisted.model.as_ref())
            .cloned()
            .unwrap_or_else(|| defaults.model.clone()),
        system_message: non_empty(persisted.system_message.as_ref())
            .cloned()
            .or_else(|| defaults.system_message.clone()),
        web_search_enabled: parse_flag(persisted.web_search_enabled.as_ref()).unwrap_or(false),
        streaming_enabled: parse_flag(persisted.streaming_enabled.as_ref())
            .unwrap_or(defaults.streaming_enabled),
        connectors: validation.connectors,
    };

    Resolution {
        settings,
        discard_connectors: validation.discard,
    }
}

/// Read the store once and resolve, erasing an unparseable connector list.
pub fn load_effective(
    store: &dyn SettingsStore,
    defaults: &SettingsDefaults,
) -> Result<EffectiveSettings, StoreError> {
    let persisted = PersistedSettings::load(store)?;
    let resolution = resolve(&persisted, defaults);

    if resolution.discard_connectors {
        store.remove(keys::CONNECTORS)?;
        tracing::info!("Erased unparseable connector configuration");
    }

    Ok(resolution.settings)
}

/// Whether the device can start chatting
pub fn is_ready(store: &dyn SettingsStore) -> bool {
    match store.get(keys::API_KEY) {
        Ok(key) => key.is_some_and(|k| !k.trim().is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read API key for readiness");
            false
        }
    }
}

/// Normalize one value returned by the configuration page.
///
/// Values may be wrapped as `{"value": x}`. Booleans become `"true"`/`"false"`.
fn form_value(key: &str, value: &Value) -> Option<String> {
    let value = match value {
        Value::Object(map) if map.contains_key("value") => map.get("value")?,
        other => other,
    };

    let text = match value {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(_) | Value::Object(_) if key == keys::CONNECTORS => value.to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// Persist values returned by the configuration page.
///
/// Empty values leave the stored value untouched. Returns the number of keys written.
pub fn apply_update(store: &dyn SettingsStore, form: &Value) -> Result<usize, StoreError> {
    let Value::Object(fields) = form else {
        tracing::warn!("Settings update is not an object, ignoring");
        return Ok(0);
    };

    let mut written = 0;
    for key in keys::ALL {
        let Some(value) = fields.get(key).and_then(|v| form_value(key, v)) else {
            continue;
        };
        store.set(key, &value)?;
        // Never log the credential itself
        if key == keys::API_KEY {
            tracing::info!(key, "Setting saved");
        } else {
            tracing::info!(key, value = %value, "Setting saved");
        }
        written += 1;
    }

    Ok(written)
}
