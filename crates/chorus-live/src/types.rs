//! Live API wire types.
//!
//! Outbound frames are externally tagged: each JSON message carries exactly
//! one of `setup`, `clientContent` or `realtimeInput`. Inbound messages are
//! a flat object where every field is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MIME type attached to every realtime audio chunk sent upstream.
pub const REALTIME_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

// ─────────────────────────────────────────────────────────────────────────────
// Shared content types
// ─────────────────────────────────────────────────────────────────────────────

/// Inline binary payload (base64 encoded) with its MIME type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// MIME type, e.g. `audio/pcm;rate=24000`. Empty when the server omits it.
    #[serde(default)]
    pub mime_type: String,
    /// Base64 data. Passed through untouched.
    pub data: String,
}

/// One part of a content turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline media content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    /// A text-only part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// A content turn: a role and its parts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// `user` or `model`. Absent on system instructions and some server turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound frames
// ─────────────────────────────────────────────────────────────────────────────

/// A message sent to the upstream service.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientFrame {
    /// First frame on a new connection.
    Setup(Setup),
    /// A complete conversational turn.
    ClientContent(ClientContent),
    /// Streaming media input.
    RealtimeInput(RealtimeInput),
}

impl ClientFrame {
    /// A single completed user turn carrying `text`.
    #[must_use]
    pub fn text_turn(text: impl Into<String>) -> Self {
        Self::ClientContent(ClientContent {
            turns: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::text(text)],
            }],
            turn_complete: true,
        })
    }

    /// One realtime audio chunk tagged with [`REALTIME_AUDIO_MIME_TYPE`].
    #[must_use]
    pub fn realtime_audio(data: impl Into<String>) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: REALTIME_AUDIO_MIME_TYPE.into(),
                data: data.into(),
            }],
        })
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::ClientContent(_) => "client_content",
            Self::RealtimeInput(_) => "realtime_input",
        }
    }
}

/// Session setup: model, generation config, instructions and tools.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name (`models/...`).
    pub model: String,
    /// Output configuration.
    pub generation_config: GenerationConfig,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Tool declarations, forwarded verbatim.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

/// Generation configuration for the live session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested output modalities (`AUDIO`, `TEXT`).
    pub response_modalities: Vec<String>,
    /// Voice selection for audio output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

/// Speech output configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    /// Voice to use.
    pub voice_config: VoiceConfig,
}

/// Voice selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// One of the service's prebuilt voices.
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

/// A prebuilt voice by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    /// Voice name, e.g. `Puck`.
    pub voice_name: String,
}

/// A completed client turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    /// Turns to append to the conversation.
    pub turns: Vec<Content>,
    /// Whether the model should respond now.
    pub turn_complete: bool,
}

/// Realtime media chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// Media chunks in arrival order.
    pub media_chunks: Vec<Blob>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound messages
// ─────────────────────────────────────────────────────────────────────────────

/// A message received from the upstream service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    /// Present (usually `{}`) once setup has been accepted.
    pub setup_complete: Option<Value>,
    /// Model output for the current turn.
    pub server_content: Option<ServerContent>,
    /// Function call requests.
    pub tool_call: Option<Value>,
    /// The server is about to disconnect.
    pub go_away: Option<GoAway>,
}

/// Model output within a turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    /// Content generated so far in this turn.
    pub model_turn: Option<Content>,
    /// The model finished its turn. `null` and absent both read as unset.
    pub turn_complete: Option<bool>,
    /// The turn was cut short by new client input.
    pub interrupted: Option<bool>,
}

/// Advance notice of a server-side disconnect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    /// Remaining time before disconnect, as a duration string.
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// First inline media payload in the model turn, if any.
    ///
    /// Parts are scanned in order; text parts ahead of the media are skipped.
    #[must_use]
    pub fn first_inline_media(&self) -> Option<&Blob> {
        self.server_content
            .as_ref()?
            .model_turn
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
    }

    /// Concatenated text parts of the model turn.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let parts = &self.server_content.as_ref()?.model_turn.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Whether this message closes out a model turn.
    #[must_use]
    pub fn is_turn_complete(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.turn_complete == Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_turn_wire_shape() {
        let frame = ClientFrame::text_turn("hello");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            json!({
                "clientContent": {
                    "turns": [{"role": "user", "parts": [{"text": "hello"}]}],
                    "turnComplete": true
                }
            })
        );
    }

    #[test]
    fn realtime_audio_wire_shape() {
        let frame = ClientFrame::realtime_audio("AAAA");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{"mimeType": "audio/pcm;rate=16000", "data": "AAAA"}]
                }
            })
        );
    }

    #[test]
    fn setup_omits_empty_optionals() {
        let frame = ClientFrame::Setup(Setup {
            model: "models/test".into(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".into()],
                speech_config: None,
            },
            system_instruction: None,
            tools: vec![],
        });
        let json = serde_json::to_value(&frame).unwrap();
        let setup = &json["setup"];
        assert_eq!(setup["model"], "models/test");
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert!(setup.get("systemInstruction").is_none());
        assert!(setup.get("tools").is_none());
        assert!(setup["generationConfig"].get("speechConfig").is_none());
    }

    #[test]
    fn frame_kinds() {
        assert_eq!(ClientFrame::text_turn("x").kind(), "client_content");
        assert_eq!(ClientFrame::realtime_audio("x").kind(), "realtime_input");
    }

    #[test]
    fn parses_audio_model_turn() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "UklGRg=="}}]
                }
            }
        }))
        .unwrap();
        let media = msg.first_inline_media().unwrap();
        assert_eq!(media.data, "UklGRg==");
        assert_eq!(media.mime_type, "audio/pcm;rate=24000");
        assert!(!msg.is_turn_complete());
    }

    #[test]
    fn inline_media_without_mime_type_still_decodes() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {"modelTurn": {"parts": [{"inlineData": {"data": "AAAA"}}]}}
        }))
        .unwrap();
        let media = msg.first_inline_media().unwrap();
        assert_eq!(media.data, "AAAA");
        assert!(media.mime_type.is_empty());
    }

    #[test]
    fn null_turn_flags_do_not_drop_audio() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "AAAA"}}]},
                "turnComplete": null,
                "interrupted": null
            }
        }))
        .unwrap();
        assert_eq!(msg.first_inline_media().unwrap().data, "AAAA");
        assert!(!msg.is_turn_complete());
        assert_eq!(msg.server_content.unwrap().interrupted, None);
    }

    #[test]
    fn first_inline_media_skips_leading_text() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"text": "thinking"},
                        {"inlineData": {"mimeType": "audio/pcm", "data": "first"}},
                        {"inlineData": {"mimeType": "audio/pcm", "data": "second"}}
                    ]
                }
            }
        }))
        .unwrap();
        assert_eq!(msg.first_inline_media().unwrap().data, "first");
    }

    #[test]
    fn text_only_turn_has_no_media() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {"modelTurn": {"parts": [{"text": "Hel"}, {"text": "lo"}]}}
        }))
        .unwrap();
        assert!(msg.first_inline_media().is_none());
        assert_eq!(msg.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn turn_complete_without_model_turn() {
        let msg: ServerMessage =
            serde_json::from_value(json!({"serverContent": {"turnComplete": true}})).unwrap();
        assert!(msg.first_inline_media().is_none());
        assert!(msg.text().is_none());
        assert!(msg.is_turn_complete());
    }

    #[test]
    fn setup_complete_and_go_away() {
        let msg: ServerMessage = serde_json::from_value(json!({"setupComplete": {}})).unwrap();
        assert!(msg.setup_complete.is_some());
        assert!(msg.server_content.is_none());

        let msg: ServerMessage =
            serde_json::from_value(json!({"goAway": {"timeLeft": "10s"}})).unwrap();
        assert_eq!(msg.go_away.unwrap().time_left.as_deref(), Some("10s"));
    }

    #[test]
    fn unknown_fields_ignored() {
        let msg: ServerMessage =
            serde_json::from_value(json!({"usageMetadata": {"totalTokenCount": 5}})).unwrap();
        assert_eq!(msg, ServerMessage::default());
    }
}
