//! Realtime transcription session
//!
//! One live WebSocket connection at a time, owned by a worker task spawned
//! per `start()`. All outbound traffic (audio frames, finalize, end-of-
//! audio, close) goes through the worker's command channel so nothing ever
//! writes to the socket from a foreign task. Incoming messages are parsed
//! by the configured [`WireProtocol`] and surfaced in arrival order on the
//! session event channel.

pub mod deltas;
pub mod protocol;
pub mod reconcile;
pub mod tokens;

use crate::config::StreamConfig;
use crate::error::SessionError;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub use protocol::{create_protocol, ServerUpdate, Token, TokenBatch, WireProtocol};
pub use reconcile::{Correction, Reconciler};

/// How long a blocking stop() waits for the worker to unwind.
const STOP_TIMEOUT: Duration = Duration::from_secs(8);

/// How long start() waits for a previous worker that is still unwinding.
const PRIOR_UNWIND_TIMEOUT: Duration = Duration::from_secs(2);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Configuring,
    Streaming,
    Finalizing,
    Closed,
    Errored,
}

/// Commands handled by the worker task that owns the socket.
enum Command {
    Audio(Vec<u8>),
    Finalize,
    Eof,
    Close,
}

/// Events surfaced to the session's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A normalized server update, in arrival order.
    Update(ServerUpdate),
    /// A session-level error. The session may still be open (server-
    /// reported errors) or about to close (transport errors).
    Error(SessionError),
    /// The worker has finished; the session can be started again.
    Closed,
}

/// A realtime transcription session.
pub struct TranscriptionSession {
    config: StreamConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    worker: Option<tokio::task::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
}

impl TranscriptionSession {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            cmd_tx: None,
            worker: None,
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    /// Open a session on a fresh worker task.
    ///
    /// Fails immediately (no connection attempt) when no API key is
    /// configured. Waits briefly for any still-unwinding prior worker so at
    /// most one live session exists per logical recording.
    pub async fn start(&mut self) -> Result<mpsc::Receiver<SessionEvent>, SessionError> {
        if self.config.api_key.is_empty() {
            return Err(SessionError::MissingCredential);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(SessionError::Protocol("session already running".to_string()));
        }

        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(PRIOR_UNWIND_TIMEOUT, worker)
                .await
                .is_err()
            {
                tracing::warn!("Previous session worker still unwinding");
            }
        }

        let protocol = create_protocol(&self.config)?;
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);

        self.running.store(true, Ordering::SeqCst);
        set_state(&self.state, SessionState::Connecting);

        let running = self.running.clone();
        let state = self.state.clone();
        self.worker = Some(tokio::spawn(run_worker(
            protocol, cmd_rx, event_tx, running, state,
        )));
        self.cmd_tx = Some(cmd_tx);

        Ok(event_rx)
    }

    /// Forward a PCM16 chunk to the open connection.
    ///
    /// Silent no-op when the session is not streaming: capture and session
    /// lifecycle are only loosely synchronized, so late or early chunks are
    /// expected, not exceptional. A full send queue drops the chunk.
    pub fn send_audio(&self, pcm: &[u8]) {
        if !self.is_streaming() {
            return;
        }
        if let Some(tx) = &self.cmd_tx {
            if tx.try_send(Command::Audio(pcm.to_vec())).is_err() {
                tracing::trace!("Audio queue full, dropping {} bytes", pcm.len());
            }
        }
    }

    /// Ask the server to flush provisional tokens to final status.
    /// No-op where the protocol has no such concept.
    pub fn finalize(&self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.try_send(Command::Finalize);
        }
    }

    /// Signal end-of-audio. No-op where the protocol has no such concept.
    pub fn send_eof(&self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.try_send(Command::Eof);
        }
    }

    /// Disconnect. Blocking mode waits (bounded) for the worker to unwind;
    /// non-blocking mode requests the close and returns immediately so a
    /// latency-sensitive caller is never frozen on network I/O. Idempotent,
    /// never errors; a never-started session ends up Closed.
    pub async fn stop(&mut self, blocking: bool) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.try_send(Command::Close);
        }
        if blocking {
            if let Some(worker) = self.worker.take() {
                if tokio::time::timeout(STOP_TIMEOUT, worker).await.is_err() {
                    tracing::warn!(
                        "Session worker did not unwind within {:?}",
                        STOP_TIMEOUT
                    );
                }
            }
        }
        if self.worker.is_none() {
            let mut state = self.state.lock().unwrap();
            if *state != SessionState::Errored {
                *state = SessionState::Closed;
            }
        }
    }
}

fn set_state(state: &Arc<Mutex<SessionState>>, value: SessionState) {
    *state.lock().unwrap() = value;
}

/// The worker task: owns the socket for the whole session lifetime.
async fn run_worker(
    mut protocol: Box<dyn WireProtocol>,
    mut cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
) {
    let mut errored = false;

    let request = match protocol.request() {
        Ok(request) => Some(request),
        Err(e) => {
            let _ = event_tx.send(SessionEvent::Error(e)).await;
            errored = true;
            None
        }
    };

    if let Some(request) = request {
        match connect_async(request).await {
            Ok((ws, _)) => {
                let (mut ws_tx, mut ws_rx) = ws.split();

                set_state(&state, SessionState::Configuring);
                let mut configured = true;
                if let Some(config_msg) = protocol.config_message() {
                    if let Err(e) = ws_tx.send(Message::Text(config_msg.into())).await {
                        if running.load(Ordering::SeqCst) {
                            let _ = event_tx
                                .send(SessionEvent::Error(SessionError::Transport(
                                    e.to_string(),
                                )))
                                .await;
                            errored = true;
                        }
                        configured = false;
                    }
                }

                if configured {
                    set_state(&state, SessionState::Streaming);
                    tracing::debug!("Session streaming ({})", protocol.name());

                    loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => match cmd {
                                Some(Command::Audio(pcm)) => {
                                    if let Err(e) = ws_tx.send(protocol.audio_message(&pcm)).await {
                                        if running.load(Ordering::SeqCst) {
                                            let _ = event_tx
                                                .send(SessionEvent::Error(
                                                    SessionError::Transport(e.to_string()),
                                                ))
                                                .await;
                                            errored = true;
                                        }
                                        break;
                                    }
                                }
                                Some(Command::Finalize) => {
                                    if let Some(msg) = protocol.finalize_message() {
                                        set_state(&state, SessionState::Finalizing);
                                        let _ = ws_tx.send(msg).await;
                                    }
                                }
                                Some(Command::Eof) => {
                                    if let Some(msg) = protocol.eof_message() {
                                        let _ = ws_tx.send(msg).await;
                                    }
                                }
                                Some(Command::Close) | None => {
                                    // Intentional close requested by stop()
                                    // or the session handle went away.
                                    let _ = ws_tx.close().await;
                                    break;
                                }
                            },
                            incoming = ws_rx.next() => match incoming {
                                Some(Ok(Message::Text(raw))) => {
                                    let mut finished = false;
                                    for update in protocol.handle_message(raw.as_str()) {
                                        match update {
                                            ServerUpdate::Finished => {
                                                finished = true;
                                                let _ = event_tx
                                                    .send(SessionEvent::Update(ServerUpdate::Finished))
                                                    .await;
                                            }
                                            ServerUpdate::ServerError { code, message } => {
                                                // Surfaced without tearing down
                                                // the connection.
                                                let _ = event_tx
                                                    .send(SessionEvent::Error(
                                                        SessionError::Server { code, message },
                                                    ))
                                                    .await;
                                            }
                                            update => {
                                                let _ = event_tx
                                                    .send(SessionEvent::Update(update))
                                                    .await;
                                            }
                                        }
                                    }
                                    if finished {
                                        let _ = ws_tx.close().await;
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    if running.load(Ordering::SeqCst) {
                                        let reason = frame
                                            .map(|f| format!("{} {}", f.code, f.reason))
                                            .unwrap_or_else(|| "no close frame".to_string());
                                        let _ = event_tx
                                            .send(SessionEvent::Error(
                                                SessionError::UnexpectedClose(reason),
                                            ))
                                            .await;
                                        errored = true;
                                    }
                                    break;
                                }
                                Some(Ok(_)) => {} // binary/ping/pong: nothing to do
                                Some(Err(e)) => {
                                    if running.load(Ordering::SeqCst) {
                                        let _ = event_tx
                                            .send(SessionEvent::Error(SessionError::Transport(
                                                e.to_string(),
                                            )))
                                            .await;
                                        errored = true;
                                    }
                                    break;
                                }
                                None => {
                                    if running.load(Ordering::SeqCst) {
                                        let _ = event_tx
                                            .send(SessionEvent::Error(
                                                SessionError::UnexpectedClose(
                                                    "stream ended".to_string(),
                                                ),
                                            ))
                                            .await;
                                        errored = true;
                                    }
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    let _ = event_tx
                        .send(SessionEvent::Error(SessionError::Connect(e.to_string())))
                        .await;
                    errored = true;
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    set_state(
        &state,
        if errored {
            SessionState::Errored
        } else {
            SessionState::Closed
        },
    );
    let _ = event_tx.send(SessionEvent::Closed).await;
    tracing::debug!("Session worker finished");
}
