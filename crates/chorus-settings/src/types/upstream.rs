//! Upstream streaming session settings.
//!
//! The relay treats everything except the endpoint, model, and credentials as
//! opaque configuration that is passed through in the session setup frame.

use serde::{Deserialize, Serialize};

/// Gemini Live bidirectional streaming endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Upstream session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// WebSocket endpoint (without the `key` query parameter).
    pub base_url: String,
    /// Model resource name.
    pub model: String,
    /// Requested response modalities (e.g. `["AUDIO"]`).
    pub response_modalities: Vec<String>,
    /// Prebuilt voice used for audio responses.
    pub voice_name: String,
    /// Optional system instruction text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Tool declarations, passed through verbatim.
    pub tools: Vec<serde_json::Value>,
    /// Connect + handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Commands buffered toward the upstream before submissions are dropped.
    pub command_queue_capacity: usize,
    /// API key. Never written back out; normally supplied via `GEMINI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: "models/gemini-2.0-flash-exp".to_string(),
            response_modalities: vec!["AUDIO".to_string()],
            voice_name: "Puck".to_string(),
            system_instruction: None,
            tools: Vec::new(),
            connect_timeout_ms: 10_000,
            command_queue_capacity: 256,
            api_key: None,
        }
    }
}
