//! Token-based realtime transcription protocol
//!
//! Wire format: one JSON start message carrying the credential, model and
//! audio parameters, then raw binary PCM frames directly on the socket.
//! Server messages are JSON objects with either a `tokens` array (each
//! `{text, is_final}`), an `error_code`/`error_message` pair, or a
//! `finished` flag signaling graceful termination.
//!
//! A `{"type": "finalize"}` message asks the server to flush provisional
//! tokens to final status; an empty binary frame marks end of audio.

use super::protocol::{build_ws_request, ServerUpdate, Token, TokenBatch, WireProtocol};
use crate::config::StreamConfig;
use crate::error::SessionError;
use serde_json::json;
use tokio_tungstenite::tungstenite::{http, Message};

const DEFAULT_ENDPOINT: &str = "wss://stt-rt.soniox.com/transcribe-websocket";
const DEFAULT_MODEL: &str = "stt-rt-preview";

/// Token-based protocol implementation
pub struct TokenProtocol {
    api_key: String,
    endpoint: String,
    model: String,
    language: String,
    sample_rate: u32,
}

impl TokenProtocol {
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
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: config.language.clone(),
            sample_rate: config.sample_rate,
        }
    }
}

impl WireProtocol for TokenProtocol {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn request(&self) -> Result<http::Request<()>, SessionError> {
        // Credential travels in the start message, not in a header.
        build_ws_request(&self.endpoint, &[])
    }

    fn config_message(&self) -> Option<String> {
        let mut start = json!({
            "api_key": self.api_key,
            "model": self.model,
            "audio_format": "pcm_s16le",
            "sample_rate": self.sample_rate,
            "num_channels": 1,
        });
        if !self.language.is_empty() {
            start["language_hints"] = json!([self.language]);
        }
        Some(start.to_string())
    }

    fn audio_message(&self, pcm: &[u8]) -> Message {
        Message::Binary(pcm.to_vec().into())
    }

    fn finalize_message(&self) -> Option<Message> {
        Some(Message::Text(
            json!({"type": "finalize"}).to_string().into(),
        ))
    }

    fn eof_message(&self) -> Option<Message> {
        // An empty frame marks end of audio.
        Some(Message::Binary(Vec::new().into()))
    }

    fn handle_message(&mut self, raw: &str) -> Vec<ServerUpdate> {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Unparseable server message: {}", e);
                return Vec::new();
            }
        };

        let mut updates = Vec::new();

        if let Some(code) = value.get("error_code") {
            let message = value
                .get("error_message")
                .and_then(|m| m.as_str())
                .unwrap_or("")
                .to_string();
            updates.push(ServerUpdate::ServerError {
                code: code.to_string().trim_matches('"').to_string(),
                message,
            });
            return updates;
        }

        if let Some(tokens) = value.get("tokens").and_then(|t| t.as_array()) {
            let batch = TokenBatch {
                tokens: tokens
                    .iter()
                    .filter_map(|t| {
                        let text = t.get("text")?.as_str()?.to_string();
                        let is_final = t
                            .get("is_final")
                            .and_then(|f| f.as_bool())
                            .unwrap_or(false);
                        Some(Token { text, is_final })
                    })
                    .collect(),
            };
            if !batch.tokens.is_empty() {
                updates.push(ServerUpdate::Tokens(batch));
            }
        }

        if value
            .get("finished")
            .and_then(|f| f.as_bool())
            .unwrap_or(false)
        {
            updates.push(ServerUpdate::Finished);
        }

        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolChoice;

    fn config() -> StreamConfig {
        StreamConfig {
            protocol: ProtocolChoice::Tokens,
            api_key: "key-123".to_string(),
            endpoint: None,
            model: None,
            language: "en".to_string(),
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_config_message_shape() {
        let proto = TokenProtocol::new(&config());
        let msg = proto.config_message().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["api_key"], "key-123");
        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["audio_format"], "pcm_s16le");
        assert_eq!(value["sample_rate"], 16000);
        assert_eq!(value["num_channels"], 1);
        assert_eq!(value["language_hints"][0], "en");
    }

    #[test]
    fn test_config_message_omits_empty_language() {
        let mut cfg = config();
        cfg.language = String::new();
        let proto = TokenProtocol::new(&cfg);
        let msg = proto.config_message().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert!(value.get("language_hints").is_none());
    }

    #[test]
    fn test_audio_is_raw_binary() {
        let proto = TokenProtocol::new(&config());
        match proto.audio_message(&[1, 2, 3, 4]) {
            Message::Binary(data) => assert_eq!(data.as_ref(), &[1u8, 2, 3, 4][..]),
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_is_empty_frame() {
        let proto = TokenProtocol::new(&config());
        match proto.eof_message().unwrap() {
            Message::Binary(data) => assert!(data.is_empty()),
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_token_batch() {
        let mut proto = TokenProtocol::new(&config());
        let updates = proto.handle_message(
            r#"{"tokens":[{"text":"hello","is_final":true},{"text":" wor","is_final":false}]}"#,
        );
        assert_eq!(
            updates,
            vec![ServerUpdate::Tokens(TokenBatch {
                tokens: vec![
                    Token {
                        text: "hello".to_string(),
                        is_final: true
                    },
                    Token {
                        text: " wor".to_string(),
                        is_final: false
                    },
                ]
            })]
        );
    }

    #[test]
    fn test_parse_error_message() {
        let mut proto = TokenProtocol::new(&config());
        let updates = proto
            .handle_message(r#"{"error_code":"invalid_audio","error_message":"bad frame"}"#);
        assert_eq!(
            updates,
            vec![ServerUpdate::ServerError {
                code: "invalid_audio".to_string(),
                message: "bad frame".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_finished_flag_after_tokens() {
        let mut proto = TokenProtocol::new(&config());
        let updates = proto.handle_message(
            r#"{"tokens":[{"text":"done","is_final":true}],"finished":true}"#,
        );
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[0], ServerUpdate::Tokens(_)));
        assert_eq!(updates[1], ServerUpdate::Finished);
    }

    #[test]
    fn test_parse_garbage_is_ignored() {
        let mut proto = TokenProtocol::new(&config());
        assert!(proto.handle_message("not json").is_empty());
        assert!(proto.handle_message("{}").is_empty());
        assert!(proto.handle_message(r#"{"tokens":[]}"#).is_empty());
    }
}
