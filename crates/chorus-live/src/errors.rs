//! Upstream session errors.

use thiserror::Error;

/// Errors establishing the upstream session.
///
/// Failures after the session is open are not returned to callers; they are
/// delivered as [`crate::UpstreamEvent::Error`].
#[derive(Debug, Error)]
pub enum LiveError {
    /// The WebSocket connection or setup handshake failed.
    #[error("upstream connect failed: {context}")]
    Connect {
        /// What went wrong.
        context: String,
    },

    /// The connection was not established in time.
    #[error("upstream connect timed out after {timeout_ms}ms")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
    },

    /// A TLS endpoint was configured without an API key.
    #[error("no API key configured for {endpoint}")]
    MissingApiKey {
        /// The endpoint, without credentials.
        endpoint: String,
    },

    /// A frame could not be serialized.
    #[error("failed to serialize upstream frame: {0}")]
    Serialize(#[from] serde_json::Error),
}
