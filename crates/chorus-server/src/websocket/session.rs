//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use chorus_core::ids::ConnectionId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;
use super::router::MessageRouter;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Heartbeat timing for one client.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Interval between server Pings.
    pub interval: Duration,
    /// Close after this long without any inbound frame.
    pub timeout: Duration,
}

/// Shared collaborators for every session.
#[derive(Clone)]
pub struct SessionContext {
    /// Live connection set.
    pub registry: Arc<ConnectionRegistry>,
    /// Routes inbound frames upstream.
    pub router: Arc<MessageRouter>,
    /// Ping cadence and idle limit.
    pub heartbeat: Heartbeat,
    /// Outbound frames buffered per client.
    pub send_queue_capacity: usize,
    /// Server-wide shutdown.
    pub shutdown: CancellationToken,
}

/// Why the writer task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterExit {
    QueueClosed,
    SocketError,
    HeartbeatTimeout,
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection
/// 2. Routes inbound text (and UTF-8 binary) frames upstream
/// 3. Forwards queued broadcast frames and sends periodic Pings
/// 4. Removes the connection on any terminal event
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(ws: WebSocket, conn_id: ConnectionId, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    if !ctx.registry.add(connection.clone()) {
        warn!("duplicate connection id, refusing session");
        return;
    }
    info!(connections = ctx.registry.len(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let outbound_conn = connection.clone();
    let heartbeat = ctx.heartbeat;
    let shutdown = ctx.shutdown.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat.interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        let exit = loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break WriterExit::QueueClosed };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break WriterExit::SocketError;
                    }
                }
                _ = ping_interval.tick() => {
                    if outbound_conn.idle_for() > heartbeat.timeout {
                        warn!(timeout = ?heartbeat.timeout, "client unresponsive, disconnecting");
                        break WriterExit::HeartbeatTimeout;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break WriterExit::SocketError;
                    }
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break WriterExit::Shutdown;
                }
            }
        };
        let _ = outbound_conn.mark_closing();
        outbound_conn.mark_closed();
        exit
    });

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else {
                    debug!("client stream ended");
                    break;
                };
                connection.mark_alive();
                match msg {
                    Message::Text(text) => {
                        let _ = ctx.router.route(&conn_id, text.as_str());
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            let _ = ctx.router.route(&conn_id, text);
                        }
                        Err(_) => debug!(len = data.len(), "ignoring non-UTF-8 binary frame"),
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            exit = &mut outbound => {
                debug!(exit = ?exit.ok(), "writer stopped");
                break;
            }
        }
    }

    // Clean up
    let _ = connection.mark_closing();
    outbound.abort();
    connection.mark_closed();
    if ctx.registry.remove(&conn_id).is_some() {
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        info!(
            age_secs = connection.age().as_secs(),
            dropped = connection.drop_count(),
            "client disconnected"
        );
    }
}
