//! State machine for the voicewire daemon
//!
//! Idle → Recording → Draining → Idle
//!
//! Draining is the grace window after a stop request: capture has ended
//! and finalize/end-of-audio have been sent, but the connection stays open
//! briefly so the server can flush trailing final tokens.

use std::time::Instant;

/// Daemon state
#[derive(Debug, Clone)]
pub enum State {
    /// Waiting for a hotkey
    Idle,

    /// Capturing audio and streaming it to the transcription session
    Recording {
        /// When recording started
        started_at: Instant,
        /// Capture stream generation feeding this recording
        capture_id: u64,
    },

    /// Recording stopped; waiting out the finalize grace before closing
    Draining {
        /// When to close the session
        until: Instant,
    },
}

impl State {
    pub fn new() -> Self {
        State::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, State::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, State::Recording { .. })
    }

    pub fn is_draining(&self) -> bool {
        matches!(self, State::Draining { .. })
    }

    /// Recording duration, if currently recording
    pub fn recording_duration(&self) -> Option<std::time::Duration> {
        match self {
            State::Recording { started_at, .. } => Some(started_at.elapsed()),
            _ => None,
        }
    }

    /// Deadline for closing the session, if draining
    pub fn drain_deadline(&self) -> Option<Instant> {
        match self {
            State::Draining { until } => Some(*until),
            _ => None,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Recording { started_at, .. } => {
                write!(f, "Recording ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
            State::Draining { .. } => write!(f, "Draining"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_state_is_idle() {
        let state = State::new();
        assert!(state.is_idle());
        assert!(!state.is_recording());
        assert!(state.recording_duration().is_none());
    }

    #[test]
    fn test_recording_state() {
        let state = State::Recording {
            started_at: Instant::now(),
            capture_id: 1,
        };
        assert!(state.is_recording());
        assert!(!state.is_idle());
        assert!(state.recording_duration().is_some());
    }

    #[test]
    fn test_draining_state() {
        let until = Instant::now() + Duration::from_millis(1500);
        let state = State::Draining { until };
        assert!(state.is_draining());
        assert_eq!(state.drain_deadline(), Some(until));
        assert!(state.recording_duration().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", State::Idle), "Idle");
        let state = State::Recording {
            started_at: Instant::now(),
            capture_id: 0,
        };
        assert!(format!("{}", state).starts_with("Recording"));
    }
}
