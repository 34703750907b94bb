//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chorus_core::ids::ConnectionId;
use chorus_live::{SessionState, UpstreamEvent, UpstreamSession};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bridge::UpstreamBridge;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::router::MessageRouter;
use crate::websocket::session::{Heartbeat, SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Collaborators handed to each client session.
    pub session: SessionContext,
    /// Upstream lifecycle as published by the bridge.
    pub upstream_state: watch::Receiver<SessionState>,
    /// Prometheus render handle.
    pub metrics_handle: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    broadcaster: Arc<Broadcaster>,
    shutdown: Arc<ShutdownCoordinator>,
    upstream_state: Arc<watch::Sender<SessionState>>,
    metrics_handle: PrometheusHandle,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server routing client input to `upstream`.
    pub fn new(
        config: ServerConfig,
        upstream: Arc<dyn UpstreamSession>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let (upstream_state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            config: Arc::new(config),
            router: Arc::new(MessageRouter::new(upstream)),
            broadcaster: Arc::new(Broadcaster::new(registry.clone())),
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            upstream_state: Arc::new(upstream_state),
            metrics_handle,
            start_time: Instant::now(),
        }
    }

    /// Bridge that feeds `events` into this server's broadcaster and
    /// `/health` state.
    pub fn upstream_bridge(&self, events: mpsc::Receiver<UpstreamEvent>) -> UpstreamBridge {
        UpstreamBridge::new(events, self.broadcaster.clone(), self.upstream_state.clone())
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            session: SessionContext {
                registry: self.registry.clone(),
                router: self.router.clone(),
                heartbeat: Heartbeat {
                    interval: self.config.heartbeat_interval,
                    timeout: self.config.heartbeat_timeout,
                },
                send_queue_capacity: self.config.send_queue_capacity,
                shutdown: self.shutdown.token(),
            },
            upstream_state: self.upstream_state.subscribe(),
            metrics_handle: self.metrics_handle.clone(),
            start_time: self.start_time,
        };

        let mut router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        if let Some(dir) = &self.config.static_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server exited with error");
            }
        });

        info!(addr = %local_addr, "relay server listening");
        Ok((local_addr, handle))
    }

    /// The live connection set.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The audio broadcaster.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limit = state.config.max_connections;
    if state.session.registry.len() >= limit {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(limit, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }
    let ctx = state.session.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ConnectionId::new(), ctx))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.session.registry.len();
    let upstream = *state.upstream_state.borrow();
    Json(health::health_check(state.start_time, connections, upstream))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
