//! Configuration loading and types for voicewire
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voicewire/config.toml)
//! 3. Environment variables (VOICEWIRE_*)
//! 4. CLI arguments (highest priority)

use crate::error::VoicewireError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voicewire Configuration
#
# Location: ~/.config/voicewire/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for default location ($XDG_RUNTIME_DIR/voicewire/state),
# a custom path, or "disabled" to turn off. The daemon writes state
# ("idle", "recording") to this file whenever it changes.
state_file = "auto"

[shortcuts]
# Toggle recording on/off. Tokens joined by + are a chord; two chords
# separated by , are a sequence; 2x<key> is a double-tap.
# Examples: "<ctrl>+<shift>+v", "2x<ctrl>", "<f9>,<f9>"
toggle = "<ctrl>+<shift>+v"

# Push-to-talk: hold to record, release to stop
push_to_talk = "<ctrl>+<shift>+b"

# Window for the second chord of a sequence, in milliseconds
# sequence_window_ms = 400

# Input backend: "auto", "device" (raw /dev/input, Linux), or "hook"
# (global keyboard hook; macOS/Windows/X11)
# backend = "auto"

[stream]
# Realtime transcription protocol: "tokens" or "deltas"
# - tokens: final/non-final token service, raw binary audio frames
# - deltas: realtime delta service, base64 audio in JSON envelopes
protocol = "tokens"

# API key for the transcription service
# Can also be set via the VOICEWIRE_API_KEY environment variable
api_key = ""

# Override the service endpoint (defaults to the protocol's endpoint)
# endpoint = "wss://example.com/stream"

# Override the transcription model (defaults per protocol)
# model = ""

# Language hint, e.g. "en". Empty means auto-detect.
language = ""

# Sample rate in Hz. Omit to use the protocol's required rate
# (16000 for tokens, 24000 for deltas).
# sample_rate = 16000

[audio]
# Audio input device ("default" uses system default)
device = "default"

# Capture chunk size in milliseconds
chunk_ms = 100

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 300

[inject]
# Delay between typed characters in milliseconds (ydotool backend)
# 0 = fastest possible, increase if characters are dropped
type_delay_ms = 0
"#;

/// Input listener backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyBackendChoice {
    /// Probe raw device access first, fall back to the hook
    #[default]
    Auto,
    /// Raw /dev/input backend (Linux)
    Device,
    /// Global keyboard hook backend
    Hook,
}

/// Transcription protocol variant selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolChoice {
    /// Final/non-final token protocol, raw binary audio
    #[default]
    Tokens,
    /// Append-only delta protocol, base64 audio envelopes
    Deltas,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub shortcuts: ShortcutConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub inject: InjectConfig,

    /// Optional path to a state file for external integrations.
    /// "auto" resolves under $XDG_RUNTIME_DIR/voicewire.
    #[serde(default)]
    pub state_file: Option<String>,
}

/// Global shortcut configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShortcutConfig {
    /// Toggle shortcut spec string
    #[serde(default = "default_toggle")]
    pub toggle: String,

    /// Push-to-talk shortcut spec string
    #[serde(default = "default_ptt")]
    pub push_to_talk: String,

    /// Sequential chord window in milliseconds
    #[serde(default = "default_sequence_window_ms")]
    pub sequence_window_ms: u64,

    /// Input backend selection
    #[serde(default)]
    pub backend: HotkeyBackendChoice,
}

impl ShortcutConfig {
    /// Window for the second chord of a sequence, clamped to a sane range.
    pub fn sequence_window(&self) -> Duration {
        Duration::from_millis(self.sequence_window_ms.clamp(100, 2000))
    }
}

/// Realtime transcription stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Protocol variant
    #[serde(default)]
    pub protocol: ProtocolChoice,

    /// Service credential. Empty means unset.
    #[serde(default)]
    pub api_key: String,

    /// Endpoint override; None uses the protocol's default endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model override; None uses the protocol's default model
    #[serde(default)]
    pub model: Option<String>,

    /// Language hint; empty means auto-detect
    #[serde(default)]
    pub language: String,

    /// Audio sample rate in Hz; 0 means the protocol's required rate
    #[serde(default)]
    pub sample_rate: u32,
}

impl StreamConfig {
    /// Fill in the protocol-required sample rate when none is configured.
    pub fn normalize(&mut self) {
        if self.sample_rate == 0 {
            self.sample_rate = match self.protocol {
                ProtocolChoice::Tokens => 16000,
                ProtocolChoice::Deltas => 24000,
            };
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Input device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Capture chunk size in milliseconds
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,

    /// Maximum recording duration in seconds (safety limit)
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
}

/// Text injection configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InjectConfig {
    /// Delay between typed characters (ms), 0 for fastest
    #[serde(default)]
    pub type_delay_ms: u32,
}

fn default_toggle() -> String {
    "<ctrl>+<shift>+v".to_string()
}

fn default_ptt() -> String {
    "<ctrl>+<shift>+b".to_string()
}

fn default_sequence_window_ms() -> u64 {
    400
}

fn default_device() -> String {
    "default".to_string()
}

fn default_chunk_ms() -> u32 {
    100
}

fn default_max_duration_secs() -> u32 {
    300
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            toggle: default_toggle(),
            push_to_talk: default_ptt(),
            sequence_window_ms: default_sequence_window_ms(),
            backend: HotkeyBackendChoice::Auto,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let mut config = Self {
            protocol: ProtocolChoice::Tokens,
            api_key: String::new(),
            endpoint: None,
            model: None,
            language: String::new(),
            sample_rate: 0,
        };
        config.normalize();
        config
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            chunk_ms: default_chunk_ms(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shortcuts: ShortcutConfig::default(),
            stream: StreamConfig::default(),
            audio: AudioConfig::default(),
            inject: InjectConfig::default(),
            state_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voicewire")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, pid)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("voicewire")
    }

    /// Resolve the state file path from config.
    /// None when unset or explicitly disabled.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file.as_ref().and_then(|path| {
            match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            }
        })
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoicewireError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VoicewireError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| VoicewireError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(key) = std::env::var("VOICEWIRE_API_KEY") {
        config.stream.api_key = key;
    }
    if let Ok(protocol) = std::env::var("VOICEWIRE_PROTOCOL") {
        config.stream.protocol = match protocol.to_lowercase().as_str() {
            "deltas" => ProtocolChoice::Deltas,
            _ => ProtocolChoice::Tokens,
        };
    }
    if let Ok(backend) = std::env::var("VOICEWIRE_HOTKEY_BACKEND") {
        config.shortcuts.backend = match backend.to_lowercase().as_str() {
            "device" => HotkeyBackendChoice::Device,
            "hook" => HotkeyBackendChoice::Hook,
            _ => HotkeyBackendChoice::Auto,
        };
    }

    config.stream.normalize();

    Ok(config)
}

/// Save configuration to file
#[allow(dead_code)]
pub fn save_config(config: &Config, path: &Path) -> Result<(), VoicewireError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VoicewireError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| VoicewireError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| VoicewireError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}
