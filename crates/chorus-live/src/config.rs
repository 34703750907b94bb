//! Connection parameters for [`crate::LiveSession`].

use std::time::Duration;

use serde_json::Value;

use crate::types::{
    ClientFrame, Content, GenerationConfig, Part, PrebuiltVoiceConfig, Setup, SpeechConfig,
    VoiceConfig,
};

/// Everything needed to open the upstream session.
#[derive(Clone)]
pub struct LiveConfig {
    /// `ws://` or `wss://` endpoint without query string.
    pub base_url: String,
    /// API key appended as the `key` query parameter. Never logged.
    pub api_key: Option<String>,
    /// Model name, e.g. `models/gemini-2.0-flash-exp`.
    pub model: String,
    /// Requested output modalities.
    pub response_modalities: Vec<String>,
    /// Prebuilt voice name. Empty disables the speech config.
    pub voice_name: String,
    /// Optional system prompt.
    pub system_instruction: Option<String>,
    /// Tool declarations, forwarded verbatim in the setup frame.
    pub tools: Vec<Value>,
    /// Upper bound on the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Capacity of the outbound command queue.
    pub command_queue_capacity: usize,
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("response_modalities", &self.response_modalities)
            .field("voice_name", &self.voice_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_queue_capacity", &self.command_queue_capacity)
            .finish_non_exhaustive()
    }
}

impl LiveConfig {
    /// Full connect URL including the API key.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}?key={key}", self.base_url),
            None => self.base_url.clone(),
        }
    }

    /// Connect URL safe for logs.
    #[must_use]
    pub fn redacted_endpoint(&self) -> String {
        match self.api_key {
            Some(_) => format!("{}?key=<redacted>", self.base_url),
            None => self.base_url.clone(),
        }
    }

    /// The setup frame sent as the first message on the connection.
    #[must_use]
    pub fn setup_frame(&self) -> ClientFrame {
        let speech_config = (!self.voice_name.is_empty()).then(|| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: self.voice_name.clone(),
                },
            },
        });
        ClientFrame::Setup(Setup {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: self.response_modalities.clone(),
                speech_config,
            },
            system_instruction: self.system_instruction.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part::text(text.clone())],
            }),
            tools: self.tools.clone(),
        })
    }
}
