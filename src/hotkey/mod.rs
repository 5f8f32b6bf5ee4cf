//! Global hotkey detection
//!
//! Two backends deliver raw key events behind one interface:
//!
//! - raw-device (`evdev_listener`, Linux): reads kernel input devices
//!   directly, so it works on every Wayland compositor. Requires the user
//!   to be in the 'input' group.
//! - windowing hook (`rdev_listener`): global keyboard hook via rdev, used
//!   on macOS/Windows/X11 and as the Linux fallback when raw device access
//!   is denied.
//!
//! The backend is selected at runtime by a capability probe; callers only
//! see [`KeyInput`] events and the [`HotkeyEngine`] facade.

#[cfg(target_os = "linux")]
pub mod evdev_listener;
pub mod rdev_listener;
pub mod recognizer;

use crate::config::{HotkeyBackendChoice, ShortcutConfig};
use crate::error::HotkeyError;
use crate::keys::KeyId;
use crate::shortcut::ShortcutSpec;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub use recognizer::{HotkeyEvent, Recognizer};

/// A normalized key transition delivered by a platform listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: KeyId,
    pub pressed: bool,
}

/// Trait for platform input listener implementations
#[async_trait::async_trait]
pub trait InputListener: Send {
    /// Start listening and return a channel of normalized key events
    async fn start(&mut self) -> Result<mpsc::Receiver<KeyInput>, HotkeyError>;

    /// Stop listening and release OS resources. Idempotent.
    async fn stop(&mut self) -> Result<(), HotkeyError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Create the input listener for this platform and configuration.
///
/// `auto` probes raw device access first on Linux and falls back to the
/// windowing hook; `device`/`hook` force a backend.
pub fn create_listener(
    choice: HotkeyBackendChoice,
) -> Result<Box<dyn InputListener>, HotkeyError> {
    match choice {
        HotkeyBackendChoice::Device => {
            #[cfg(target_os = "linux")]
            {
                Ok(Box::new(evdev_listener::EvdevListener::new()?))
            }
            #[cfg(not(target_os = "linux"))]
            {
                Err(HotkeyError::HookUnavailable(
                    "raw device backend is only available on Linux".to_string(),
                ))
            }
        }
        HotkeyBackendChoice::Hook => Ok(Box::new(rdev_listener::RdevListener::new())),
        HotkeyBackendChoice::Auto => {
            #[cfg(target_os = "linux")]
            {
                match evdev_listener::EvdevListener::new() {
                    Ok(listener) => {
                        tracing::info!("Using raw-device (evdev) hotkey backend");
                        return Ok(Box::new(listener));
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Raw device access unavailable ({}), falling back to keyboard hook",
                            e
                        );
                    }
                }
            }
            tracing::info!("Using windowing-hook (rdev) hotkey backend");
            Ok(Box::new(rdev_listener::RdevListener::new()))
        }
    }
}

/// Owns the platform listener and the recognition state machine.
///
/// Shortcut reconfiguration goes through [`HotkeyEngine::set_shortcuts`],
/// which stops and restarts the listener so recognition state is never
/// mutated concurrently with event processing.
pub struct HotkeyEngine {
    listener: Box<dyn InputListener>,
    toggle: ShortcutSpec,
    ptt: ShortcutSpec,
    window: Duration,
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl HotkeyEngine {
    pub fn new(config: &ShortcutConfig) -> Result<Self, HotkeyError> {
        let listener = create_listener(config.backend)?;
        let toggle = ShortcutSpec::parse(&config.toggle);
        let ptt = ShortcutSpec::parse(&config.push_to_talk);
        if toggle.is_empty() && ptt.is_empty() {
            tracing::warn!("No usable shortcuts configured; hotkeys will never fire");
        }
        Ok(Self {
            listener,
            toggle,
            ptt,
            window: config.sequence_window(),
            pump: None,
        })
    }

    /// Start the listener and recognition pump. Returns the hotkey event
    /// channel. Idempotent: a running engine is restarted.
    pub async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError> {
        if self.pump.is_some() {
            self.stop().await?;
        }

        let raw_rx = self.listener.start().await?;
        let (tx, rx) = mpsc::channel(32);
        let mut recognizer =
            Recognizer::new(self.toggle.clone(), self.ptt.clone(), self.window);

        self.pump = Some(tokio::spawn(async move {
            let mut raw_rx = raw_rx;
            while let Some(input) = raw_rx.recv().await {
                let now = Instant::now();
                let events = if input.pressed {
                    recognizer.on_key_down(input.key, now)
                } else {
                    recognizer.on_key_up(input.key, now)
                };
                for event in events {
                    tracing::debug!("Hotkey fired: {:?}", event);
                    if tx.send(event).await.is_err() {
                        return; // receiver dropped
                    }
                }
            }
        }));

        Ok(rx)
    }

    /// Stop the listener and drop recognition state. Idempotent.
    pub async fn stop(&mut self) -> Result<(), HotkeyError> {
        self.listener.stop().await?;
        if let Some(pump) = self.pump.take() {
            // The raw channel closed with the listener; the pump exits on
            // its own, this just reaps it.
            let _ = pump.await;
        }
        Ok(())
    }

    /// Replace the configured shortcuts. Restarts the listener when it was
    /// running; the new recognizer starts from a clean slate.
    pub async fn set_shortcuts(
        &mut self,
        toggle: &str,
        push_to_talk: &str,
    ) -> Result<Option<mpsc::Receiver<HotkeyEvent>>, HotkeyError> {
        let was_running = self.pump.is_some();
        if was_running {
            self.stop().await?;
        }
        self.toggle = ShortcutSpec::parse(toggle);
        self.ptt = ShortcutSpec::parse(push_to_talk);
        if was_running {
            Ok(Some(self.start().await?))
        } else {
            Ok(None)
        }
    }
}
