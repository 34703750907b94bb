//! Upstream WebSocket client over `tokio-tungstenite`.
//!
//! [`LiveSession`] owns a command queue; a spawned I/O task writes queued
//! frames and turns everything it reads into [`UpstreamEvent`]s.

use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::LiveConfig;
use crate::errors::LiveError;
use crate::lifecycle::{CloseInfo, UpstreamEvent};
use crate::types::{ClientFrame, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the inbound event channel.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Metric: commands dropped because the queue was full or closed.
pub const UPSTREAM_COMMANDS_DROPPED_TOTAL: &str = "upstream_commands_dropped_total";

/// Send surface of the upstream session.
///
/// Both operations are fire-and-forget: they never block the caller and
/// never report delivery. Transport failures surface as
/// [`UpstreamEvent::Error`] on the event channel instead.
pub trait UpstreamSession: Send + Sync {
    /// Submit one completed user text turn.
    fn submit_text_turn(&self, text: String);

    /// Submit one base64 audio chunk as realtime input.
    fn submit_realtime_media(&self, data: String);
}

enum Command {
    Frame(ClientFrame),
    Close,
}

/// A connected Live API session.
pub struct LiveSession {
    cmd_tx: mpsc::Sender<Command>,
    dropped: AtomicU64,
    _io: JoinHandle<()>,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("closed", &self.cmd_tx.is_closed())
            .field("dropped", &self.dropped_commands())
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    /// Connect, send the setup frame, and start the I/O task.
    ///
    /// Returns the session and the receiver for its events. The first event
    /// is always [`UpstreamEvent::Open`]; the last is always
    /// [`UpstreamEvent::Close`].
    pub async fn connect(
        config: LiveConfig,
    ) -> Result<(Self, mpsc::Receiver<UpstreamEvent>), LiveError> {
        // local ws:// endpoints (tests, proxies) may run without a key
        if config.api_key.is_none() && config.base_url.starts_with("wss://") {
            return Err(LiveError::MissingApiKey {
                endpoint: config.base_url,
            });
        }
        info!(
            endpoint = %config.redacted_endpoint(),
            model = %config.model,
            "connecting to upstream"
        );

        let timeout_ms = u64::try_from(config.connect_timeout.as_millis()).unwrap_or(u64::MAX);
        let connect = connect_async(config.endpoint());
        let (mut ws, _) = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| LiveError::Timeout { timeout_ms })?
            .map_err(|e| LiveError::Connect {
                context: format!("WebSocket connect: {e}"),
            })?;

        let setup = serde_json::to_string(&config.setup_frame())?;
        ws.send(Message::Text(setup.into()))
            .await
            .map_err(|e| LiveError::Connect {
                context: format!("send setup: {e}"),
            })?;
        debug!("setup frame sent");

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let io = tokio::spawn(live_io_loop(ws, cmd_rx, event_tx));

        Ok((
            Self {
                cmd_tx,
                dropped: AtomicU64::new(0),
                _io: io,
            },
            event_rx,
        ))
    }

    /// Close the upstream connection. Queued frames ahead of the close are
    /// still written.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }

    /// Commands dropped since connect.
    pub fn dropped_commands(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, frame: ClientFrame) {
        let kind = frame.kind();
        match self.cmd_tx.try_send(Command::Frame(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(UPSTREAM_COMMANDS_DROPPED_TOTAL).increment(1);
                warn!(kind, "upstream command queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(UPSTREAM_COMMANDS_DROPPED_TOTAL).increment(1);
                debug!(kind, "upstream session closed, dropping frame");
            }
        }
    }
}

impl UpstreamSession for LiveSession {
    fn submit_text_turn(&self, text: String) {
        self.enqueue(ClientFrame::text_turn(text));
    }

    fn submit_realtime_media(&self, data: String) {
        self.enqueue(ClientFrame::realtime_audio(data));
    }
}

async fn emit(events: &mpsc::Sender<UpstreamEvent>, event: UpstreamEvent) {
    // receiver gone means nobody is listening; nothing to do
    let _ = events.send(event).await;
}

fn close_info(frame: Option<CloseFrame>) -> CloseInfo {
    match frame {
        Some(frame) => CloseInfo {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.to_string(),
        },
        None => CloseInfo::local("closed without frame"),
    }
}

async fn handle_inbound_text(text: &str, events: &mpsc::Sender<UpstreamEvent>) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => emit(events, UpstreamEvent::Message(Box::new(msg))).await,
        Err(e) => warn!(error = %e, len = text.len(), "undecodable upstream message"),
    }
}

async fn live_io_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<Command>,
    events: mpsc::Sender<UpstreamEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    emit(&events, UpstreamEvent::Open).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(Command::Frame(frame)) = cmd else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    emit(&events, UpstreamEvent::Close(CloseInfo::local("closed by relay"))).await;
                    break;
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(kind = frame.kind(), error = %e, "failed to serialize upstream frame");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    emit(&events, UpstreamEvent::Error(format!("upstream write failed: {e}"))).await;
                    emit(&events, UpstreamEvent::Close(CloseInfo::local("write failed"))).await;
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_inbound_text(text.as_str(), &events).await,
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_inbound_text(text, &events).await,
                        Err(_) => warn!(len = data.len(), "non-UTF-8 binary frame from upstream"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        emit(&events, UpstreamEvent::Close(close_info(frame))).await;
                        break;
                    }
                    // ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        emit(&events, UpstreamEvent::Error(e.to_string())).await;
                        emit(&events, UpstreamEvent::Close(CloseInfo::local("transport error"))).await;
                        break;
                    }
                    None => {
                        emit(&events, UpstreamEvent::Close(CloseInfo::local("stream ended"))).await;
                        break;
                    }
                }
            }
        }
    }
    debug!("upstream I/O loop exited");
}
