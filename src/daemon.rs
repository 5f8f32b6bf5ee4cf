//! Daemon module - main event loop orchestration
//!
//! Coordinates the hotkey engine, audio capture, the transcription
//! session, the reconciler and text injection.
//!
//! Two long-lived background contexts run alongside this loop: the input
//! listener (raw-device poll or hook thread) and the session's socket
//! worker. They are causally connected only here, by dispatching hotkey
//! events into session start/stop calls.

use crate::audio::{self, AudioCapture, AudioChunk};
use crate::config::Config;
use crate::error::Result;
use crate::hotkey::{HotkeyEngine, HotkeyEvent};
use crate::inject::InjectionRouter;
use crate::relay::AudioRelay;
use crate::session::{
    Reconciler, ServerUpdate, SessionEvent, TranscriptionSession,
};
use crate::state::State;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Grace delay between finalize/end-of-audio and closing the session, so
/// the server can flush trailing final tokens. A trade-off between
/// transcript completeness and responsiveness, not a protocol guarantee.
const DRAIN_GRACE: Duration = Duration::from_millis(1500);

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Write PID file so external tooling can find the daemon
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::runtime_dir().join("pid");

    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

/// Remove PID file on shutdown
fn cleanup_pid_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove PID file: {}", e);
        }
    }
}

/// Everything that makes up one recording pipeline: the session, the
/// capture handle, and the text path from tokens to keystrokes.
struct Pipeline {
    session: TranscriptionSession,
    capture: Option<Box<dyn AudioCapture>>,
    relay: AudioRelay,
    reconciler: Reconciler,
    router: InjectionRouter,
    /// Preview of the delta protocol's in-progress turn
    preview: String,
    /// Capture stream generation counter
    capture_seq: u64,
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    pid_file_path: Option<PathBuf>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();
        Self {
            config,
            state_file_path,
            pid_file_path: None,
        }
    }

    /// Update the state file if configured
    fn update_state(&self, state_name: &str) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, state_name);
        }
    }

    /// Begin audio capture and a realtime transcription session.
    async fn start_recording(
        &self,
        state: &mut State,
        pipe: &mut Pipeline,
        session_rx: &mut Option<mpsc::Receiver<SessionEvent>>,
        audio_rx: &mut Option<mpsc::Receiver<AudioChunk>>,
    ) {
        // A drain in progress means the previous session is still open;
        // request its close now and let start() wait out the unwind.
        if state.is_draining() {
            pipe.session.stop(false).await;
            *session_rx = None;
        }

        pipe.reconciler.reset();
        pipe.router.reset();
        pipe.preview.clear();

        match pipe.session.start().await {
            Ok(rx) => *session_rx = Some(rx),
            Err(e) => {
                tracing::error!("Cannot start transcription: {}", e);
                return;
            }
        }

        match audio::create_capture(&self.config.audio, self.config.stream.sample_rate) {
            Ok(mut capture) => match capture.start().await {
                Ok(rx) => {
                    pipe.capture_seq += 1;
                    pipe.relay.attach(pipe.capture_seq);
                    *audio_rx = Some(rx);
                    pipe.capture = Some(capture);
                    *state = State::Recording {
                        started_at: Instant::now(),
                        capture_id: pipe.capture_seq,
                    };
                    self.update_state("recording");
                    tracing::info!("Recording started");
                }
                Err(e) => {
                    tracing::error!("Failed to start audio: {}", e);
                    pipe.session.stop(false).await;
                    *session_rx = None;
                }
            },
            Err(e) => {
                tracing::error!("Failed to create audio capture: {}", e);
                pipe.session.stop(false).await;
                *session_rx = None;
            }
        }
    }

    /// Stop capture, flush the session and schedule its close.
    ///
    /// Finalize asks the server to confirm pending provisional tokens and
    /// end-of-audio marks the stream; the session itself stays open for
    /// the drain grace so trailing finals still get typed.
    async fn stop_recording(&self, state: &mut State, pipe: &mut Pipeline) {
        let duration = state.recording_duration().unwrap_or_default();
        tracing::info!("Recording stopped ({:.1}s)", duration.as_secs_f32());

        if let Some(mut capture) = pipe.capture.take() {
            if let Err(e) = capture.stop().await {
                tracing::warn!("Audio capture stop failed: {}", e);
            }
        }
        pipe.relay.detach();

        pipe.session.finalize();
        pipe.session.send_eof();

        *state = State::Draining {
            until: Instant::now() + DRAIN_GRACE,
        };
        self.update_state("idle");
    }

    /// Abort an active recording without the drain grace (session died).
    async fn abort_recording(&self, state: &mut State, pipe: &mut Pipeline) {
        if let Some(mut capture) = pipe.capture.take() {
            let _ = capture.stop().await;
        }
        pipe.relay.detach();
        *state = State::Idle;
        self.update_state("idle");
    }

    /// Route one session event. Returns true when the worker has finished.
    async fn handle_session_event(&self, event: SessionEvent, pipe: &mut Pipeline) -> bool {
        match event {
            SessionEvent::Update(ServerUpdate::Tokens(batch)) => {
                if let Some(correction) = pipe.reconciler.apply(&batch) {
                    if let Err(e) = pipe
                        .router
                        .apply(correction.erase_count, &correction.insert_text)
                        .await
                    {
                        tracing::error!("Injection failed: {}", e);
                    }
                }
            }
            SessionEvent::Update(ServerUpdate::Delta(delta)) => {
                pipe.preview.push_str(&delta);
                tracing::trace!("Turn preview: {:?}", pipe.preview);
                if let Err(e) = pipe.router.apply(0, &delta).await {
                    tracing::error!("Injection failed: {}", e);
                }
            }
            SessionEvent::Update(ServerUpdate::TurnStarted) => {
                pipe.preview.clear();
                pipe.reconciler.reset();
            }
            SessionEvent::Update(ServerUpdate::TurnCompleted(transcript)) => {
                tracing::debug!("Turn completed: {:?}", transcript);
                pipe.preview.clear();
            }
            SessionEvent::Update(ServerUpdate::Finished) => {
                tracing::info!("Server finished the stream");
            }
            SessionEvent::Update(ServerUpdate::ServerError { code, message }) => {
                // Normally mapped to SessionEvent::Error by the worker.
                tracing::error!("Server error {}: {}", code, message);
            }
            SessionEvent::Error(e) => {
                tracing::error!("Session error: {}", e);
            }
            SessionEvent::Closed => return true,
        }
        false
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voicewire daemon");

        self.pid_file_path = write_pid_file();

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            crate::error::VoicewireError::Config(format!(
                "Failed to set up SIGTERM handler: {}",
                e
            ))
        })?;

        tracing::info!(
            "Shortcuts: toggle={:?} push_to_talk={:?}",
            self.config.shortcuts.toggle,
            self.config.shortcuts.push_to_talk
        );
        if let Some(ref path) = self.state_file_path {
            tracing::info!("State file: {:?}", path);
        }

        // Zero shortcuts means nothing will ever fire; surfaced loudly,
        // but a running daemon is still useful for config inspection.
        let mut engine = HotkeyEngine::new(&self.config.shortcuts)?;
        let mut hotkey_rx = engine.start().await?;

        let mut pipe = Pipeline {
            session: TranscriptionSession::new(self.config.stream.clone()),
            capture: None,
            relay: AudioRelay::new(),
            reconciler: Reconciler::new(),
            router: InjectionRouter::new(&self.config.inject),
            preview: String::new(),
            capture_seq: 0,
        };

        let mut state = State::Idle;
        let mut session_rx: Option<mpsc::Receiver<SessionEvent>> = None;
        let mut audio_rx: Option<mpsc::Receiver<AudioChunk>> = None;

        let max_duration = Duration::from_secs(self.config.audio.max_duration_secs as u64);

        self.update_state("idle");

        loop {
            tokio::select! {
                // Hotkey events drive session start/stop
                Some(event) = hotkey_rx.recv() => {
                    match event {
                        HotkeyEvent::Toggle => {
                            if state.is_recording() {
                                self.stop_recording(&mut state, &mut pipe).await;
                            } else {
                                self.start_recording(
                                    &mut state, &mut pipe, &mut session_rx, &mut audio_rx,
                                ).await;
                            }
                        }
                        HotkeyEvent::HoldStart => {
                            if !state.is_recording() {
                                self.start_recording(
                                    &mut state, &mut pipe, &mut session_rx, &mut audio_rx,
                                ).await;
                            }
                        }
                        HotkeyEvent::HoldEnd => {
                            if state.is_recording() {
                                self.stop_recording(&mut state, &mut pipe).await;
                            }
                        }
                    }
                }

                // Audio chunks flow through the relay into the session
                chunk = async {
                    match &mut audio_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match chunk {
                        Some(chunk) => {
                            if let State::Recording { capture_id, .. } = &state {
                                tracing::trace!("Audio level: {:.3}", chunk.level);
                                pipe.relay.forward(*capture_id, &chunk.pcm, &pipe.session);
                            }
                        }
                        None => audio_rx = None,
                    }
                }

                // Session events: transcript updates, errors, closure
                event = async {
                    match &mut session_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        Some(event) => {
                            if self.handle_session_event(event, &mut pipe).await {
                                session_rx = None;
                                if state.is_recording() {
                                    tracing::warn!("Session ended while recording");
                                    self.abort_recording(&mut state, &mut pipe).await;
                                } else if state.is_draining() {
                                    state = State::Idle;
                                }
                            }
                        }
                        None => session_rx = None,
                    }
                }

                // Close the session once the drain grace has passed
                _ = async {
                    match state.drain_deadline() {
                        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
                        None => std::future::pending().await,
                    }
                } => {
                    pipe.session.stop(false).await;
                    state = State::Idle;
                }

                // Safety limit on recording length
                _ = tokio::time::sleep(Duration::from_millis(100)), if state.is_recording() => {
                    if let Some(duration) = state.recording_duration() {
                        if duration > max_duration {
                            tracing::warn!(
                                "Recording timeout ({:.0}s limit), stopping",
                                max_duration.as_secs_f32()
                            );
                            self.stop_recording(&mut state, &mut pipe).await;
                        }
                    }
                }

                // Graceful shutdown (SIGINT from Ctrl+C)
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                // Graceful shutdown (SIGTERM from systemctl stop)
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        // Cleanup
        if state.is_recording() {
            self.abort_recording(&mut state, &mut pipe).await;
        }
        pipe.session.stop(true).await;
        engine.stop().await?;

        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }
        if let Some(ref path) = self.pid_file_path {
            cleanup_pid_file(path);
        }

        tracing::info!("Daemon stopped");

        Ok(())
    }
}
