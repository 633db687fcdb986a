//! Wire protocol for the bidirectional inference socket.
//!
//! Outbound messages are built as `serde_json::Value`s; inbound messages are
//! classified by tolerant inspection rather than strict deserialization,
//! because the service's reply envelope is not contractually guaranteed.
//! Two reply shapes have been observed in the wild and both are accepted:
//!
//! ```text
//! { "serverContent": { "modelTurn": { "parts": [{ "text": … }] } } }
//! { "candidates": [{ "content": { "parts": [{ "text": … }] } }] }
//! ```
//!
//! Anything unrecognized parses to [`ServerMessage::Unknown`] — never an
//! error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::audio::AudioFrame;

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Model-serving path for the bidirectional streaming service.
pub const SERVICE_PATH: &str =
    "ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Build the socket URL, authenticating via an API-key query parameter.
pub fn endpoint_url(host: &str, api_key: &str) -> String {
    format!("wss://{host}/{SERVICE_PATH}?key={api_key}")
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// Session-setup handshake declaring model parameters and the tutor prompt.
///
/// Sent once per connection, before any audio; the server acknowledges with
/// a `setupComplete` message.
pub fn setup_message(model: &str, system_prompt: &str) -> Value {
    json!({
        "setup": {
            "model": model,
            "generation_config": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 1024,
                "response_modalities": ["TEXT"]
            },
            "system_prompt": system_prompt
        }
    })
}

/// One frame of audio as a base64 PCM media chunk.
pub fn audio_message(frame: &AudioFrame) -> Value {
    json!({
        "realtime_input": {
            "media_chunks": [{
                "data": BASE64.encode(frame.to_le_bytes()),
                "mime_type": "audio/pcm"
            }]
        }
    })
}

/// A complete conversational text turn (marks the user's turn as finished).
pub fn turn_message(text: &str) -> Value {
    json!({
        "client_content": {
            "turns": [{ "role": "user", "parts": [{ "text": text }] }],
            "turn_complete": true
        }
    })
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake acknowledgment — the connection is usable.
    SetupComplete,
    /// Model text, with all reply parts concatenated in order.
    ModelText(String),
    /// Structurally valid JSON that matches no known envelope, or a payload
    /// that is not JSON at all.
    Unknown,
}

impl ServerMessage {
    /// Classify a raw text payload. Infallible by design: malformed input is
    /// [`ServerMessage::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return ServerMessage::Unknown;
        };

        if value.get("setupComplete").is_some() {
            return ServerMessage::SetupComplete;
        }

        match extract_text(&value) {
            Some(text) if !text.is_empty() => ServerMessage::ModelText(text),
            _ => ServerMessage::Unknown,
        }
    }
}

/// Pull the model's text out of either observed reply envelope.
fn extract_text(value: &Value) -> Option<String> {
    // Newer socket envelope.
    let parts = value["serverContent"]["modelTurn"]["parts"]
        .as_array()
        // Older REST-style envelope.
        .or_else(|| value["candidates"][0]["content"]["parts"].as_array())?;

    let mut text = String::new();
    for part in parts {
        if let Some(t) = part["text"].as_str() {
            text.push_str(t);
        }
    }
    Some(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FrameEncoder;

    fn one_frame() -> AudioFrame {
        let mut enc = FrameEncoder::new();
        enc.push(&vec![0.5_f32; 512]).remove(0)
    }

    // ---- Endpoint ----------------------------------------------------------

    #[test]
    fn endpoint_url_includes_host_path_and_key() {
        let url = endpoint_url("generativelanguage.googleapis.com", "abc123");
        assert!(url.starts_with("wss://generativelanguage.googleapis.com/ws/"));
        assert!(url.contains("BidiGenerateContent"));
        assert!(url.ends_with("?key=abc123"));
    }

    // ---- Outbound ----------------------------------------------------------

    #[test]
    fn setup_message_shape() {
        let msg = setup_message("models/test-model", "be a tutor");
        assert_eq!(msg["setup"]["model"], "models/test-model");
        assert_eq!(msg["setup"]["system_prompt"], "be a tutor");
        assert_eq!(msg["setup"]["generation_config"]["response_modalities"][0], "TEXT");
    }

    #[test]
    fn audio_message_carries_base64_pcm() {
        let frame = one_frame();
        let msg = audio_message(&frame);

        let chunk = &msg["realtime_input"]["media_chunks"][0];
        assert_eq!(chunk["mime_type"], "audio/pcm");

        let decoded = BASE64.decode(chunk["data"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, frame.to_le_bytes());
    }

    #[test]
    fn turn_message_marks_turn_complete() {
        let msg = turn_message("done speaking");
        assert_eq!(msg["client_content"]["turn_complete"], true);
        assert_eq!(msg["client_content"]["turns"][0]["role"], "user");
        assert_eq!(
            msg["client_content"]["turns"][0]["parts"][0]["text"],
            "done speaking"
        );
    }

    // ---- Inbound -----------------------------------------------------------

    #[test]
    fn parses_setup_complete() {
        assert_eq!(
            ServerMessage::parse(r#"{"setupComplete": {}}"#),
            ServerMessage::SetupComplete
        );
    }

    #[test]
    fn parses_server_content_envelope() {
        let raw = r#"{"serverContent":{"modelTurn":{"parts":[{"text":"hello"}]}}}"#;
        assert_eq!(
            ServerMessage::parse(raw),
            ServerMessage::ModelText("hello".into())
        );
    }

    #[test]
    fn parses_candidates_envelope() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"hi there"}]}}]}"#;
        assert_eq!(
            ServerMessage::parse(raw),
            ServerMessage::ModelText("hi there".into())
        );
    }

    #[test]
    fn concatenates_multiple_parts_in_order() {
        let raw = r#"{"serverContent":{"modelTurn":{"parts":[
            {"text":"first "},{"text":"second"}
        ]}}}"#;
        assert_eq!(
            ServerMessage::parse(raw),
            ServerMessage::ModelText("first second".into())
        );
    }

    #[test]
    fn unknown_envelope_is_not_an_error() {
        assert_eq!(ServerMessage::parse(r#"{"something":"else"}"#), ServerMessage::Unknown);
        assert_eq!(ServerMessage::parse("not json at all"), ServerMessage::Unknown);
        assert_eq!(ServerMessage::parse(""), ServerMessage::Unknown);
    }

    #[test]
    fn empty_parts_are_unknown() {
        let raw = r#"{"serverContent":{"modelTurn":{"parts":[]}}}"#;
        assert_eq!(ServerMessage::parse(raw), ServerMessage::Unknown);
    }
}
