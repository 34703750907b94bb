//! Audio fan-out to connected WebSocket clients.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use super::connection::SendError;
use super::registry::ConnectionRegistry;
use crate::metrics::{RELAY_BROADCASTS_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// `type` of the outbound audio envelope.
pub const AUDIO_STREAM_TYPE: &str = "audioStream";

#[derive(Serialize)]
struct AudioEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a str,
}

/// Serialize the client-facing envelope for one audio payload.
pub fn audio_envelope(payload: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&AudioEnvelope {
        kind: AUDIO_STREAM_TYPE,
        data: payload,
    })
}

/// Per-broadcast delivery counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Frames queued.
    pub delivered: usize,
    /// Connections skipped because they were not open.
    pub skipped: usize,
    /// Open connections whose queue rejected the frame.
    pub failed: usize,
}

/// Sends upstream audio to every live client.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Broadcaster over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Wrap `payload` in an `audioStream` envelope and queue the same
    /// serialized frame for every open connection.
    ///
    /// Connections that are not open are skipped, not removed; their own
    /// session task removes them when the transport reports the close.
    pub fn broadcast_audio(&self, payload: &str) -> BroadcastReport {
        let json = match audio_envelope(payload) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize audio envelope");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let visit = self.registry.for_each_live(|conn| match conn.send(Arc::clone(&json)) {
            Ok(()) => {
                report.delivered += 1;
                Ok(())
            }
            Err(SendError::NotOpen(_)) => {
                report.skipped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        });

        for (conn_id, e) in &visit.failures {
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            warn!(conn_id = %conn_id, error = %e, "failed to send audio to client");
        }
        report.failed = visit.failures.len();
        counter!(RELAY_BROADCASTS_TOTAL).increment(1);
        debug!(
            recipients = visit.visited,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            bytes = json.len(),
            "broadcast audio"
        );
        report
    }

    /// The registry this broadcaster reads.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
