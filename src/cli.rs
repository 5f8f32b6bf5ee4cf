// Command-line interface definitions for voicewire

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voicewire")]
#[command(author, version, about = "Streaming voice typing for Linux and macOS")]
#[command(long_about = "
Voicewire streams microphone audio to a realtime speech-to-text service
and types the recognized text into the focused application, controlled by
global keyboard shortcuts.

SETUP:
  1. Set your API key: export VOICEWIRE_API_KEY=... (or stream.api_key in
     ~/.config/voicewire/config.toml)
  2. On Linux, add yourself to the input group for raw hotkey capture:
     sudo usermod -aG input $USER  (then log out and back in)
  3. Install wtype (Wayland) or ydotool for text injection
  4. Run: voicewire

USAGE:
  Press Ctrl+Shift+V (default) to toggle dictation, or hold Ctrl+Shift+B
  to push-to-talk. Recognized text appears at the cursor as you speak.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the transcription protocol (tokens, deltas)
    #[arg(long, value_name = "PROTOCOL")]
    pub protocol: Option<String>,

    /// Override the toggle shortcut (e.g. "<ctrl>+<shift>+v", "2x<ctrl>")
    #[arg(long, value_name = "SPEC")]
    pub toggle: Option<String>,

    /// Override the push-to-talk shortcut
    #[arg(long, value_name = "SPEC")]
    pub push_to_talk: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Show the resolved configuration
    Config,

    /// Parse a shortcut spec and print its canonical form
    Check {
        /// Shortcut spec string, e.g. "<ctrl>+<shift>+v" or "2xa"
        spec: String,
    },
}
