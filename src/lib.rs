//! Voicewire: streaming voice typing
//!
//! This library provides the core functionality for:
//! - Global hotkey recognition (chords, sequences, double-taps) via a
//!   raw-device or windowing-hook backend
//! - Capturing audio via cpal (PipeWire, PulseAudio, ALSA, CoreAudio)
//! - Streaming audio to a realtime speech-to-text service over a
//!   persistent WebSocket (token-based or delta-based protocol)
//! - Reconciling provisional recognition results into erase/retype
//!   corrections
//! - Injecting text into the focused application via wtype/ydotool
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐      ┌──────────────────────────────────────┐
//!   │    Hotkey    │      │                Daemon                │
//!   │ (evdev/rdev) │─────▶│  toggle / hold-start / hold-end      │
//!   └──────────────┘      └──────────────────────────────────────┘
//!                             │ start/stop               ▲
//!                             ▼                          │ events
//!   ┌──────────────┐ PCM ┌─────────┐ frames ┌─────────────────────┐
//!   │    Audio     │────▶│  Relay  │───────▶│ TranscriptionSession │
//!   │    (cpal)    │     └─────────┘        │  (WebSocket worker)  │
//!   └──────────────┘                        └─────────────────────┘
//!                                               │ token batches
//!                                               ▼
//!                                         ┌────────────┐
//!                                         │ Reconciler │
//!                                         └────────────┘
//!                                               │ erase N, type S
//!                                               ▼
//!                                         ┌────────────┐
//!                                         │   Inject   │
//!                                         │wtype/ydotl │
//!                                         └────────────┘
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod inject;
pub mod keys;
pub mod relay;
pub mod session;
pub mod shortcut;
pub mod state;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, VoicewireError};
