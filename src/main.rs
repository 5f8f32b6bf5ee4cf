//! Voicewire - streaming voice typing
//!
//! Run with `voicewire` or `voicewire daemon` to start the daemon.
//! Use `voicewire config` to inspect the resolved configuration and
//! `voicewire check <spec>` to validate a shortcut string.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use voicewire::cli::{Cli, Commands};
use voicewire::config::{self, ProtocolChoice};
use voicewire::daemon::Daemon;
use voicewire::shortcut::ShortcutSpec;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voicewire={}", log_level))),
        )
        .init();

    let mut config = config::load_config(cli.config.as_deref())?;

    // CLI arguments take priority over file and environment
    if let Some(ref protocol) = cli.protocol {
        config.stream.protocol = match protocol.to_lowercase().as_str() {
            "deltas" => ProtocolChoice::Deltas,
            "tokens" => ProtocolChoice::Tokens,
            other => {
                anyhow::bail!("Unknown protocol {:?}, expected \"tokens\" or \"deltas\"", other)
            }
        };
        config.stream.sample_rate = 0;
        config.stream.normalize();
    }
    if let Some(ref toggle) = cli.toggle {
        config.shortcuts.toggle = toggle.clone();
    }
    if let Some(ref ptt) = cli.push_to_talk {
        config.shortcuts.push_to_talk = ptt.clone();
    }

    match cli.command {
        None | Some(Commands::Daemon) => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }
        Some(Commands::Config) => {
            if let Some(path) = config::Config::default_path() {
                println!("# Config file: {}", path.display());
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Check { spec }) => {
            let parsed = ShortcutSpec::parse(&spec);
            if parsed.is_empty() {
                println!("{:?} matches nothing", spec);
            } else {
                println!("{}", parsed);
            }
        }
    }

    Ok(())
}
