//! Client message decoding and routing to the upstream session.

use std::sync::Arc;

use chorus_core::ids::ConnectionId;
use chorus_live::UpstreamSession;
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::{RELAY_CLIENT_MESSAGES_TOTAL, RELAY_DECODE_ERRORS_TOTAL};

/// `type` of a client text turn.
pub const TEXT_TURN_TYPE: &str = "contentUpdateText";
/// `type` of a client realtime audio chunk.
pub const REALTIME_INPUT_TYPE: &str = "realtimeInput";

/// A decoded client message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A full text turn.
    #[serde(rename = "contentUpdateText")]
    TextTurn {
        /// Turn text.
        text: String,
    },
    /// One encoded audio chunk.
    #[serde(rename = "realtimeInput")]
    RealtimeAudio {
        /// Base64 PCM audio.
        #[serde(rename = "audioData")]
        audio_data: String,
    },
    /// Any other or missing `type`.
    #[serde(other)]
    Unknown,
}

/// A client message that could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON.
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// A known `type` with a missing or mistyped payload field.
    #[error("invalid {kind} payload: {source}")]
    Payload {
        /// The message `type`.
        kind: String,
        /// What serde rejected.
        source: serde_json::Error,
    },
}

/// Decode one raw client frame.
///
/// Unknown or missing `type` decodes to [`ClientMessage::Unknown`] rather
/// than an error so newer clients can send message kinds we don't handle.
pub fn decode(raw: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Json)?;
    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(ClientMessage::Unknown);
    };
    if kind != TEXT_TURN_TYPE && kind != REALTIME_INPUT_TYPE {
        return Ok(ClientMessage::Unknown);
    }
    serde_json::from_value(value).map_err(|source| DecodeError::Payload { kind, source })
}

/// What [`MessageRouter::route`] did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded as a text turn.
    TextTurn,
    /// Forwarded as realtime audio.
    RealtimeAudio,
    /// Unrecognized type; dropped quietly.
    Ignored,
    /// Decode failure; dropped and logged.
    Rejected,
}

impl RouteOutcome {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextTurn => "text_turn",
            Self::RealtimeAudio => "realtime_audio",
            Self::Ignored => "ignored",
            Self::Rejected => "rejected",
        }
    }
}

/// Routes client frames to the shared upstream session.
pub struct MessageRouter {
    upstream: Arc<dyn UpstreamSession>,
}

impl MessageRouter {
    /// Router over `upstream`.
    pub fn new(upstream: Arc<dyn UpstreamSession>) -> Self {
        Self { upstream }
    }

    /// Decode `raw` and forward it. Never fails; nothing is sent back to
    /// the client.
    pub fn route(&self, conn_id: &ConnectionId, raw: &str) -> RouteOutcome {
        let outcome = match decode(raw) {
            Ok(ClientMessage::TextTurn { text }) => {
                debug!(conn_id = %conn_id, bytes = text.len(), "text turn");
                self.upstream.submit_text_turn(text);
                RouteOutcome::TextTurn
            }
            Ok(ClientMessage::RealtimeAudio { audio_data }) => {
                self.upstream.submit_realtime_media(audio_data);
                RouteOutcome::RealtimeAudio
            }
            Ok(ClientMessage::Unknown) => {
                debug!(conn_id = %conn_id, "ignoring message with unrecognized type");
                RouteOutcome::Ignored
            }
            Err(e) => {
                warn!(
                    conn_id = %conn_id,
                    error = %e,
                    bytes = raw.len(),
                    "dropping malformed client message"
                );
                counter!(RELAY_DECODE_ERRORS_TOTAL).increment(1);
                RouteOutcome::Rejected
            }
        };
        counter!(RELAY_CLIENT_MESSAGES_TOTAL, "kind" => outcome.as_str()).increment(1);
        outcome
    }
}
