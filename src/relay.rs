//! Audio chunk relay
//!
//! Pure forwarding seam between the capture collaborator and the active
//! transcription session. The capture side must already deliver PCM16
//! little-endian mono at the protocol's sample rate; no resampling or
//! buffering happens here. Chunks from a capture stream the relay did not
//! originate are ignored, so a stale stream that outlives its recording
//! cannot leak audio into the next session.

use crate::session::TranscriptionSession;

/// Forwards capture chunks into the active session.
#[derive(Debug, Default)]
pub struct AudioRelay {
    /// Capture stream generation this relay currently accepts.
    origin: Option<u64>,
    forwarded: u64,
    dropped: u64,
}

impl AudioRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept chunks from the given capture generation.
    pub fn attach(&mut self, origin: u64) {
        self.origin = Some(origin);
        self.forwarded = 0;
        self.dropped = 0;
    }

    /// Stop accepting chunks.
    pub fn detach(&mut self) {
        if self.forwarded > 0 || self.dropped > 0 {
            tracing::debug!(
                "Relay detached: {} chunks forwarded, {} dropped",
                self.forwarded,
                self.dropped
            );
        }
        self.origin = None;
    }

    /// Forward one PCM chunk. The session itself silently drops audio when
    /// it is not streaming, so the relay stays a thin seam.
    pub fn forward(&mut self, origin: u64, pcm: &[u8], session: &TranscriptionSession) {
        if self.origin != Some(origin) {
            self.dropped += 1;
            tracing::trace!("Dropping chunk from stale capture stream {}", origin);
            return;
        }
        if session.is_streaming() {
            session.send_audio(pcm);
            self.forwarded += 1;
        } else {
            self.dropped += 1;
        }
    }

    #[cfg(test)]
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    #[cfg(test)]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProtocolChoice, StreamConfig};

    fn idle_session() -> TranscriptionSession {
        TranscriptionSession::new(StreamConfig {
            protocol: ProtocolChoice::Tokens,
            api_key: "key".to_string(),
            endpoint: None,
            model: None,
            language: String::new(),
            sample_rate: 16000,
        })
    }

    #[test]
    fn test_detached_relay_drops_everything() {
        let session = idle_session();
        let mut relay = AudioRelay::new();
        relay.forward(1, &[0u8; 320], &session);
        assert_eq!(relay.forwarded(), 0);
        assert_eq!(relay.dropped(), 1);
    }

    #[test]
    fn test_stale_origin_is_ignored() {
        let session = idle_session();
        let mut relay = AudioRelay::new();
        relay.attach(2);
        relay.forward(1, &[0u8; 320], &session);
        assert_eq!(relay.forwarded(), 0);
        assert_eq!(relay.dropped(), 1);
    }

    #[test]
    fn test_non_streaming_session_counts_drop() {
        // The session is idle, so the relay counts the chunk as dropped
        // rather than forwarding it.
        let session = idle_session();
        let mut relay = AudioRelay::new();
        relay.attach(1);
        relay.forward(1, &[0u8; 320], &session);
        assert_eq!(relay.forwarded(), 0);
        assert_eq!(relay.dropped(), 1);
    }
}
