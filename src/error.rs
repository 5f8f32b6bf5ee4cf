//! Error types for voicewire
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the voicewire application
#[derive(Error, Debug)]
pub enum VoicewireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Text injection error: {0}")]
    Inject(#[from] InjectError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("No keyboard device could be opened in /dev/input/")]
    NoInputSource,

    #[error("Keyboard hook unavailable: {0}")]
    HookUnavailable(String),

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to the realtime transcription session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No API key configured. Set stream.api_key in the config file or the VOICEWIRE_API_KEY environment variable.")]
    MissingCredential,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed unexpectedly: {0}")]
    UnexpectedClose(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error {code}: {message}")]
    Server { code: String, message: String },
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'")]
    DeviceNotFound(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("wtype not found in PATH. Install via your package manager.")]
    WtypeNotFound,

    #[error("ydotool not found in PATH. Install via your package manager.")]
    YdotoolNotFound,

    #[error("ydotool daemon not running.\n  Start with: systemctl --user start ydotool")]
    YdotoolNotRunning,

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),

    #[error("All injection methods failed. Ensure wtype or ydotool is available.")]
    AllMethodsFailed,
}

/// Result type alias using VoicewireError
pub type Result<T> = std::result::Result<T, VoicewireError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
