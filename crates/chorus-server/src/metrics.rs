//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if a global recorder
/// is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Broadcast frames not queued for an open client (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Audio broadcasts performed (counter).
pub const RELAY_BROADCASTS_TOTAL: &str = "relay_broadcasts_total";
/// Client messages routed (counter, labels: kind).
pub const RELAY_CLIENT_MESSAGES_TOTAL: &str = "relay_client_messages_total";
/// Client messages that failed to decode (counter).
pub const RELAY_DECODE_ERRORS_TOTAL: &str = "relay_decode_errors_total";
/// Upstream events received (counter, labels: kind).
pub const UPSTREAM_EVENTS_TOTAL: &str = "upstream_events_total";
/// Upstream commands dropped before reaching the socket (counter).
pub const UPSTREAM_COMMANDS_DROPPED_TOTAL: &str =
    chorus_live::session::UPSTREAM_COMMANDS_DROPPED_TOTAL;
