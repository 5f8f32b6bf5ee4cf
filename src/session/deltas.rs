//! Delta-based realtime transcription protocol
//!
//! Wire format: the connection URL selects a realtime session model; a
//! `session.update` message configures transcription-only mode with server
//! VAD turn detection; audio travels as `input_audio_buffer.append`
//! messages with base64 payloads. Server events are discriminated by
//! `type`: transcription deltas append to the current turn,
//! `speech_started` marks a turn boundary, and `completed` carries the
//! turn's full transcript.
//!
//! There is no finalize or end-of-audio message: the server's VAD owns
//! turn segmentation, so both are no-ops here.

use super::protocol::{build_ws_request, ServerUpdate, WireProtocol};
use crate::config::StreamConfig;
use crate::error::SessionError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tokio_tungstenite::tungstenite::{http, Message};

const DEFAULT_ENDPOINT: &str = "wss://api.openai.com/v1/realtime";

/// The WebSocket URL requires a realtime-capable session model; the
/// transcription model is configured separately inside session.update.
const SESSION_MODEL: &str = "gpt-4o-mini-realtime-preview";

const DEFAULT_TRANSCRIBE_MODEL: &str = "gpt-4o-mini-transcribe";

const EVENT_DELTA: &str = "conversation.item.input_audio_transcription.delta";
const EVENT_COMPLETED: &str = "conversation.item.input_audio_transcription.completed";
const EVENT_SPEECH_STARTED: &str = "input_audio_buffer.speech_started";

/// Delta-based protocol implementation
pub struct DeltaProtocol {
    api_key: String,
    endpoint: String,
    model: String,
    language: String,
}

impl DeltaProtocol {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSCRIBE_MODEL.to_string()),
            language: config.language.clone(),
        }
    }
}

impl WireProtocol for DeltaProtocol {
    fn name(&self) -> &'static str {
        "deltas"
    }

    fn request(&self) -> Result<http::Request<()>, SessionError> {
        let url = format!("{}?model={}", self.endpoint, SESSION_MODEL);
        build_ws_request(
            &url,
            &[
                ("Authorization", format!("Bearer {}", self.api_key)),
                ("OpenAI-Beta", "realtime=v1".to_string()),
            ],
        )
    }

    fn config_message(&self) -> Option<String> {
        let mut transcription = json!({ "model": self.model });
        if !self.language.is_empty() {
            transcription["language"] = json!(self.language);
        }
        let session_update = json!({
            "type": "session.update",
            "session": {
                "modalities": ["text"],
                "input_audio_format": "pcm16",
                "input_audio_transcription": transcription,
                "turn_detection": {
                    "type": "server_vad",
                    "threshold": 0.5,
                    "prefix_padding_ms": 300,
                    "silence_duration_ms": 500,
                    "create_response": false,
                },
            },
        });
        Some(session_update.to_string())
    }

    fn audio_message(&self, pcm: &[u8]) -> Message {
        let event = json!({
            "type": "input_audio_buffer.append",
            "audio": BASE64.encode(pcm),
        });
        Message::Text(event.to_string().into())
    }

    fn finalize_message(&self) -> Option<Message> {
        None
    }

    fn eof_message(&self) -> Option<Message> {
        None
    }

    fn handle_message(&mut self, raw: &str) -> Vec<ServerUpdate> {
        let event: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Unparseable server event: {}", e);
                return Vec::new();
            }
        };

        let etype = event.get("type").and_then(|t| t.as_str()).unwrap_or("");
        match etype {
            EVENT_DELTA => {
                let delta = event.get("delta").and_then(|d| d.as_str()).unwrap_or("");
                if delta.is_empty() {
                    Vec::new()
                } else {
                    vec![ServerUpdate::Delta(delta.to_string())]
                }
            }
            EVENT_COMPLETED => {
                let transcript = event
                    .get("transcript")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if transcript.is_empty() {
                    Vec::new()
                } else {
                    vec![ServerUpdate::TurnCompleted(transcript)]
                }
            }
            EVENT_SPEECH_STARTED => vec![ServerUpdate::TurnStarted],
            "error" => {
                let err = event.get("error").cloned().unwrap_or(json!({}));
                let code = err
                    .get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or("error")
                    .to_string();
                let message = err
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                vec![ServerUpdate::ServerError { code, message }]
            }
            "session.created" => {
                tracing::info!(
                    "Realtime session created: {}",
                    event["session"]["id"].as_str().unwrap_or("?")
                );
                Vec::new()
            }
            "session.updated" => {
                tracing::info!("Realtime session configured");
                Vec::new()
            }
            _ => {
                tracing::trace!("Ignoring server event type {:?}", etype);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolChoice;

    fn config() -> StreamConfig {
        StreamConfig {
            protocol: ProtocolChoice::Deltas,
            api_key: "sk-test".to_string(),
            endpoint: None,
            model: None,
            language: String::new(),
            sample_rate: 24000,
        }
    }

    #[test]
    fn test_request_carries_auth_headers() {
        let proto = DeltaProtocol::new(&config());
        let req = proto.request().unwrap();
        assert!(req.uri().to_string().contains(SESSION_MODEL));
        assert_eq!(
            req.headers().get("Authorization").unwrap(),
            "Bearer sk-test"
        );
        assert_eq!(req.headers().get("OpenAI-Beta").unwrap(), "realtime=v1");
    }

    #[test]
    fn test_session_update_shape() {
        let proto = DeltaProtocol::new(&config());
        let msg = proto.config_message().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["type"], "session.update");
        let session = &value["session"];
        assert_eq!(session["input_audio_format"], "pcm16");
        assert_eq!(
            session["input_audio_transcription"]["model"],
            DEFAULT_TRANSCRIBE_MODEL
        );
        assert_eq!(session["turn_detection"]["type"], "server_vad");
        assert_eq!(session["turn_detection"]["create_response"], false);
        // No language configured: the hint is omitted entirely.
        assert!(session["input_audio_transcription"].get("language").is_none());
    }

    #[test]
    fn test_audio_is_base64_json() {
        let proto = DeltaProtocol::new(&config());
        match proto.audio_message(&[0x01, 0x02]) {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(value["type"], "input_audio_buffer.append");
                let audio = value["audio"].as_str().unwrap();
                assert_eq!(BASE64.decode(audio).unwrap(), vec![0x01, 0x02]);
            }
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_finalize_and_eof_are_noop() {
        let proto = DeltaProtocol::new(&config());
        assert!(proto.finalize_message().is_none());
        assert!(proto.eof_message().is_none());
    }

    #[test]
    fn test_parse_delta_event() {
        let mut proto = DeltaProtocol::new(&config());
        let updates = proto.handle_message(
            r#"{"type":"conversation.item.input_audio_transcription.delta","item_id":"i1","delta":"hel"}"#,
        );
        assert_eq!(updates, vec![ServerUpdate::Delta("hel".to_string())]);
    }

    #[test]
    fn test_parse_completed_event_trims() {
        let mut proto = DeltaProtocol::new(&config());
        let updates = proto.handle_message(
            r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":" hello world "}"#,
        );
        assert_eq!(
            updates,
            vec![ServerUpdate::TurnCompleted("hello world".to_string())]
        );
    }

    #[test]
    fn test_parse_speech_started_event() {
        let mut proto = DeltaProtocol::new(&config());
        let updates =
            proto.handle_message(r#"{"type":"input_audio_buffer.speech_started"}"#);
        assert_eq!(updates, vec![ServerUpdate::TurnStarted]);
    }

    #[test]
    fn test_parse_error_event() {
        let mut proto = DeltaProtocol::new(&config());
        let updates = proto.handle_message(
            r#"{"type":"error","error":{"code":"rate_limit","message":"slow down"}}"#,
        );
        assert_eq!(
            updates,
            vec![ServerUpdate::ServerError {
                code: "rate_limit".to_string(),
                message: "slow down".to_string(),
            }]
        );
    }

    #[test]
    fn test_lifecycle_events_produce_no_updates() {
        let mut proto = DeltaProtocol::new(&config());
        assert!(proto
            .handle_message(r#"{"type":"session.created","session":{"id":"s1"}}"#)
            .is_empty());
        assert!(proto.handle_message(r#"{"type":"session.updated"}"#).is_empty());
        assert!(proto.handle_message("garbage").is_empty());
    }
}
