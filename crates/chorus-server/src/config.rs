//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use chorus_settings::ServerSettings;

/// Runtime configuration for [`crate::server::RelayServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between server-initiated Ping frames.
    pub heartbeat_interval: Duration,
    /// Close a client after this long without hearing from it.
    pub heartbeat_timeout: Duration,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per client.
    pub send_queue_capacity: usize,
    /// Directory served for unmatched routes.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 100,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            max_message_size: 16 * 1024 * 1024, // 16 MB
            send_queue_capacity: 256,
            static_dir: None,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            heartbeat_interval: Duration::from_millis(s.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(s.heartbeat_timeout_ms),
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity,
            static_dir: s.static_dir.as_ref().map(PathBuf::from),
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_heartbeat() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(90));
    }

    #[test]
    fn from_settings_converts_units() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 8080,
            heartbeat_interval_ms: 1_500,
            heartbeat_timeout_ms: 4_500,
            static_dir: Some("/srv/chorus".into()),
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(1_500));
        assert_eq!(cfg.heartbeat_timeout, Duration::from_millis(4_500));
        assert_eq!(cfg.static_dir, Some(PathBuf::from("/srv/chorus")));
        assert_eq!(cfg.max_connections, 100);
        assert_eq!(cfg.send_queue_capacity, 256);
    }
}
