//! Graceful shutdown of the relay.
//!
//! Cancelling the shared token stops the listener, makes every client writer
//! send Close `1001 Going Away`, and ends the upstream bridge. The
//! coordinator then waits for the tracked tasks and for the registry to
//! drain, bounded by a timeout.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::websocket::registry::ConnectionRegistry;

/// Default timeout for graceful shutdown before giving up on tasks.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the registry is checked while clients disconnect.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Outcome of [`ShutdownCoordinator::graceful_shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Clients registered when shutdown began.
    pub clients_at_start: usize,
    /// Clients still registered when the wait ended.
    pub clients_remaining: usize,
    /// The timeout elapsed before everything finished.
    pub timed_out: bool,
}

/// Owns the relay-wide cancellation token.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for `handles` to finish and for
    /// every client in `registry` to be removed.
    pub async fn graceful_shutdown(
        &self,
        registry: &ConnectionRegistry,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> ShutdownReport {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let clients_at_start = registry.len();

        self.shutdown();
        info!(
            clients = clients_at_start,
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "closing client sessions"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            while !registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };
        let timed_out = tokio::time::timeout(timeout, drain).await.is_err();

        let report = ShutdownReport {
            clients_at_start,
            clients_remaining: registry.len(),
            timed_out,
        };
        if timed_out {
            warn!(
                remaining = report.clients_remaining,
                "shutdown timed out after {timeout:?}"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chorus_core::ids::ConnectionId;
    use chorus_live::RecordingSession;
    use futures::StreamExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::config::ServerConfig;
    use crate::server::RelayServer;
    use crate::websocket::connection::ClientConnection;

    fn registered(registry: &ConnectionRegistry, id: &str) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(1);
        let _ = registry.add(Arc::new(ClientConnection::new(ConnectionId::from(id), tx)));
        rx
    }

    #[test]
    fn shutdown_cancels_every_token_clone() {
        let coord = ShutdownCoordinator::new();
        let session_token = coord.token();
        let bridge_token = coord.token();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        coord.shutdown();
        assert!(session_token.is_cancelled());
        assert!(bridge_token.is_cancelled());
    }

    #[tokio::test]
    async fn waits_for_sessions_to_deregister() {
        let coord = ShutdownCoordinator::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let _rx = registered(&registry, "conn_a");

        // stands in for a session task removing itself once cancelled
        let token = coord.token();
        let reg = registry.clone();
        let session = tokio::spawn(async move {
            token.cancelled().await;
            let _ = reg.remove(&ConnectionId::from("conn_a"));
        });

        let report = coord
            .graceful_shutdown(&registry, vec![session], Some(Duration::from_secs(1)))
            .await;
        assert_eq!(
            report,
            ShutdownReport {
                clients_at_start: 1,
                clients_remaining: 0,
                timed_out: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_client_is_reported_after_timeout() {
        let coord = ShutdownCoordinator::new();
        let registry = ConnectionRegistry::new();
        let _rx = registered(&registry, "conn_stuck");

        let start = tokio::time::Instant::now();
        let report = coord
            .graceful_shutdown(&registry, Vec::new(), Some(Duration::from_secs(2)))
            .await;
        assert!(report.timed_out);
        assert_eq!(report.clients_remaining, 1);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn connected_client_gets_going_away_close() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = RelayServer::new(
            ServerConfig::default(),
            Arc::new(RecordingSession::new()),
            handle,
        );
        let (addr, serve) = server.listen().await.unwrap();
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        while server.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let report = server
            .shutdown()
            .graceful_shutdown(server.registry(), vec![serve], Some(Duration::from_secs(5)))
            .await;
        assert_eq!(report.clients_at_start, 1);
        assert_eq!(report.clients_remaining, 0);

        let mut close_code = None;
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Close(frame) = msg {
                close_code = frame.map(|f| u16::from(f.code));
                break;
            }
        }
        assert_eq!(close_code, Some(1001));
    }
}
