//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their compiled default.

mod server;
mod upstream;

pub use server::*;
pub use upstream::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the relay.
///
/// Example settings file:
///
/// ```json
/// {
///   "server": { "port": 8080, "staticDir": "./public" },
///   "upstream": { "voiceName": "Kore" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Client-facing HTTP/WebSocket server.
    pub server: ServerSettings,
    /// Upstream streaming session.
    pub upstream: UpstreamSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: chorus_core::constants::NAME.to_string(),
            server: ServerSettings::default(),
            upstream: UpstreamSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RelaySettings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.max_connections == 0 {
            return Err(SettingsError::invalid("server.maxConnections", "must be at least 1"));
        }
        if s.send_queue_capacity == 0 {
            return Err(SettingsError::invalid("server.sendQueueCapacity", "must be at least 1"));
        }
        if s.heartbeat_interval_ms == 0 || s.heartbeat_timeout_ms < s.heartbeat_interval_ms {
            return Err(SettingsError::invalid(
                "server.heartbeatTimeoutMs",
                format!(
                    "{} must be >= a non-zero heartbeatIntervalMs ({})",
                    s.heartbeat_timeout_ms, s.heartbeat_interval_ms
                ),
            ));
        }
        let u = &self.upstream;
        if u.model.trim().is_empty() {
            return Err(SettingsError::invalid("upstream.model", "is empty"));
        }
        if u.command_queue_capacity == 0 {
            return Err(SettingsError::invalid(
                "upstream.commandQueueCapacity",
                "must be at least 1",
            ));
        }
        if !u.base_url.starts_with("ws://") && !u.base_url.starts_with("wss://") {
            return Err(SettingsError::invalid(
                "upstream.baseUrl",
                format!("must be a ws:// or wss:// URL, got {}", u.base_url),
            ));
        }
        Ok(())
    }
}
