//! Wire protocol abstraction for realtime transcription services
//!
//! Two protocol families exist: token-based services deliver batches of
//! final/non-final tokens and accept raw binary audio; delta-based services
//! deliver append-only text deltas per turn and accept base64 audio inside
//! JSON envelopes. Both sit behind [`WireProtocol`] so the session worker
//! never branches on the variant.

use crate::config::{ProtocolChoice, StreamConfig};
use crate::error::SessionError;
use tokio_tungstenite::tungstenite::{self, http, Message};

/// One recognition token from a token-based service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub is_final: bool,
}

/// A server response unit: the ordered tokens of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBatch {
    pub tokens: Vec<Token>,
}

/// Normalized server-to-client updates produced by a protocol parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUpdate {
    /// Token-based variant: a batch of final/non-final tokens.
    Tokens(TokenBatch),
    /// Delta-based variant: an append-only text increment for the
    /// in-progress turn.
    Delta(String),
    /// Delta-based variant: the server detected the start of speech
    /// (turn boundary).
    TurnStarted,
    /// Delta-based variant: full transcript of a completed turn.
    TurnCompleted(String),
    /// The server signaled graceful end of the stream.
    Finished,
    /// Server-reported error. Does not terminate the connection by itself.
    ServerError { code: String, message: String },
}

/// Strategy trait for the vendor-specific message framing.
pub trait WireProtocol: Send {
    /// Protocol name for logging
    fn name(&self) -> &'static str;

    /// Build the WebSocket upgrade request (URL plus auth headers)
    fn request(&self) -> Result<http::Request<()>, SessionError>;

    /// Configuration message sent once immediately after connect
    fn config_message(&self) -> Option<String>;

    /// Wrap a PCM16 chunk in the protocol's audio framing
    fn audio_message(&self, pcm: &[u8]) -> Message;

    /// Ask the server to flush provisional tokens to final status.
    /// None where the protocol has no such concept.
    fn finalize_message(&self) -> Option<Message>;

    /// Signal end-of-audio. None where the protocol has no such concept.
    fn eof_message(&self) -> Option<Message>;

    /// Parse one incoming text message into normalized updates
    fn handle_message(&mut self, raw: &str) -> Vec<ServerUpdate>;
}

/// Factory function to create the protocol for the configured variant
pub fn create_protocol(config: &StreamConfig) -> Result<Box<dyn WireProtocol>, SessionError> {
    let protocol: Box<dyn WireProtocol> = match config.protocol {
        ProtocolChoice::Tokens => Box::new(super::tokens::TokenProtocol::new(config)),
        ProtocolChoice::Deltas => Box::new(super::deltas::DeltaProtocol::new(config)),
    };
    tracing::debug!("Using {} transcription protocol", protocol.name());
    Ok(protocol)
}

/// Build a WebSocket upgrade request with the standard handshake headers
/// plus any protocol-specific ones.
pub fn build_ws_request(
    url: &str,
    headers: &[(&str, String)],
) -> Result<http::Request<()>, SessionError> {
    let uri: http::Uri = url
        .parse()
        .map_err(|e| SessionError::Connect(format!("invalid endpoint {}: {}", url, e)))?;
    let host = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .ok_or_else(|| SessionError::Connect(format!("endpoint {} has no host", url)))?;

    let mut request = http::Request::builder()
        .uri(uri)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        );

    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }

    request
        .body(())
        .map_err(|e| SessionError::Connect(format!("failed to build request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_request_headers() {
        let req = build_ws_request(
            "wss://example.com/v1/stream",
            &[("Authorization", "Bearer key".to_string())],
        )
        .unwrap();
        assert_eq!(req.uri().host(), Some("example.com"));
        assert_eq!(
            req.headers().get("Authorization").unwrap(),
            "Bearer key"
        );
        assert_eq!(req.headers().get("Upgrade").unwrap(), "websocket");
        assert!(req.headers().contains_key("Sec-WebSocket-Key"));
    }

    #[test]
    fn test_build_ws_request_rejects_garbage_url() {
        assert!(build_ws_request("not a url", &[]).is_err());
    }
}
