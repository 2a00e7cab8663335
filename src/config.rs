//! Deployment configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

/// Deployment-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Streaming default when no persisted value overrides it
    pub streaming_default: bool,
    /// Bound on the non-streaming request
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            port: 8000,
            streaming_default: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{home}/.watch-relay/settings.db"))
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            db_path: lookup("RELAY_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            port: lookup("RELAY_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            streaming_default: lookup("RELAY_STREAMING")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.streaming_default),
            request_timeout: lookup("RELAY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
        }
    }
}
