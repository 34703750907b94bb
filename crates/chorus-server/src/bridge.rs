//! Upstream bridge: drives the session lifecycle from [`UpstreamEvent`]s
//! and forwards model audio to the [`Broadcaster`].

use std::sync::Arc;

use chorus_live::{ServerMessage, SessionLifecycle, SessionState, UpstreamEvent};
use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::UPSTREAM_EVENTS_TOTAL;
use crate::websocket::broadcast::Broadcaster;

/// Consumes upstream events for the lifetime of the process.
pub struct UpstreamBridge {
    events: mpsc::Receiver<UpstreamEvent>,
    broadcaster: Arc<Broadcaster>,
    lifecycle: SessionLifecycle,
    state: Arc<watch::Sender<SessionState>>,
}

impl UpstreamBridge {
    /// Create a bridge publishing lifecycle changes to `state`.
    pub fn new(
        events: mpsc::Receiver<UpstreamEvent>,
        broadcaster: Arc<Broadcaster>,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        Self {
            events,
            broadcaster,
            lifecycle: SessionLifecycle::new(),
            state,
        }
    }

    /// Run until the event stream ends or `cancel` fires.
    #[tracing::instrument(skip_all, name = "upstream_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("upstream event stream ended");
                        break;
                    };
                    self.handle(event);
                }
                () = cancel.cancelled() => break,
            }
        }
    }

    /// Apply one event.
    pub fn handle(&mut self, event: UpstreamEvent) {
        let kind = event.kind();
        counter!(UPSTREAM_EVENTS_TOTAL, "kind" => kind).increment(1);

        let state = match self.lifecycle.advance(&event) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "dropping upstream event");
                return;
            }
        };
        let _ = self.state.send_replace(state);

        match event {
            UpstreamEvent::Open => info!("upstream session open"),
            UpstreamEvent::Message(msg) => self.on_message(&msg),
            UpstreamEvent::Error(e) => error!(error = %e, "upstream session error"),
            UpstreamEvent::Close(info) => warn!(
                code = ?info.code,
                reason = %info.reason,
                "upstream session closed; clients stay connected without audio"
            ),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    fn on_message(&self, msg: &ServerMessage) {
        if msg.setup_complete.is_some() {
            info!("upstream setup complete");
        }
        if let Some(go_away) = &msg.go_away {
            warn!(time_left = ?go_away.time_left, "upstream announced disconnect");
        }
        if msg.tool_call.is_some() {
            debug!("ignoring upstream tool call");
        }

        if let Some(media) = msg.first_inline_media() {
            let report = self.broadcaster.broadcast_audio(&media.data);
            debug!(
                mime_type = %media.mime_type,
                delivered = report.delivered,
                "forwarded model audio"
            );
        } else if let Some(text) = msg.text() {
            // text-only turns are not surfaced to clients
            debug!(bytes = text.len(), "model text without audio");
        }

        if msg.is_turn_complete() {
            debug!("model turn complete");
        }
    }
}
