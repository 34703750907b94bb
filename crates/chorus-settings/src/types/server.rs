//! Client-facing server and logging settings.

use serde::{Deserialize, Serialize};

/// HTTP / WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
    /// Interval between server-initiated Ping frames, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a client after this long without any inbound frame, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Largest accepted inbound WebSocket message in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per client before sends start failing.
    pub send_queue_capacity: usize,
    /// Directory served at `/` (the browser client page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 100,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 16 * 1024 * 1024,
            send_queue_capacity: 256,
            static_dir: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
