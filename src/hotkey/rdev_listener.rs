//! rdev-based windowing-hook listener
//!
//! Installs a global keyboard hook via rdev. Used on macOS/Windows/X11 and
//! as the Linux fallback when /dev/input access is denied. On macOS this
//! requires Accessibility permission.
//!
//! rdev's listen() has no way to uninstall the hook from another thread,
//! so the hook thread is installed once per listener and start/stop attach
//! and detach the event sink instead. A detached hook delivers nothing and
//! holds no per-session state.

use super::{InputListener, KeyInput};
use crate::error::HotkeyError;
use crate::keys::KeyId;
use rdev::{Event, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Sink = Arc<Mutex<Option<mpsc::Sender<KeyInput>>>>;

/// rdev-based windowing-hook listener
pub struct RdevListener {
    running: Arc<AtomicBool>,
    sink: Sink,
    hook_installed: bool,
}

impl RdevListener {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            sink: Arc::new(Mutex::new(None)),
            hook_installed: false,
        }
    }
}

impl Default for RdevListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InputListener for RdevListener {
    async fn start(&mut self) -> Result<mpsc::Receiver<KeyInput>, HotkeyError> {
        let (tx, rx) = mpsc::channel(64);
        {
            let mut sink = self.sink.lock().unwrap();
            *sink = Some(tx);
        }
        self.running.store(true, Ordering::SeqCst);

        if !self.hook_installed {
            let running = self.running.clone();
            let sink = self.sink.clone();

            std::thread::spawn(move || {
                let callback = move |event: Event| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    let input = match event.event_type {
                        EventType::KeyPress(key) => KeyId::from_rdev(key).map(|key| KeyInput {
                            key,
                            pressed: true,
                        }),
                        EventType::KeyRelease(key) => KeyId::from_rdev(key).map(|key| KeyInput {
                            key,
                            pressed: false,
                        }),
                        _ => None,
                    };
                    if let Some(input) = input {
                        let sender = sink.lock().unwrap().clone();
                        if let Some(sender) = sender {
                            let _ = sender.blocking_send(input);
                        }
                    }
                };

                // Blocks for the lifetime of the hook.
                if let Err(e) = rdev::listen(callback) {
                    tracing::error!("Keyboard hook error: {:?}", e);
                    tracing::warn!(
                        "Global key capture failed. On macOS, grant Accessibility \
                         permission in System Settings > Privacy & Security."
                    );
                }
            });
            self.hook_installed = true;
        }

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        self.running.store(false, Ordering::SeqCst);
        let mut sink = self.sink.lock().unwrap();
        *sink = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rdev-hook"
    }
}
