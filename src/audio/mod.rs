//! Audio capture module
//!
//! Captures microphone audio via cpal and streams fixed-size PCM16
//! little-endian mono chunks at the sample rate the transcription protocol
//! requires, plus an informational 0..1 level per chunk.

pub mod cpal_capture;

use crate::config::AudioConfig;
use crate::error::AudioError;
use tokio::sync::mpsc;

/// One captured audio block.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// PCM16 little-endian mono samples
    pub pcm: Vec<u8>,
    /// Mean absolute level, 0..1, for diagnostics
    pub level: f32,
}

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send {
    /// Start capturing. Returns a channel of PCM chunks.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, AudioError>;

    /// Stop capturing and release the device.
    async fn stop(&mut self) -> Result<(), AudioError>;
}

/// Factory function to create the capture backend.
///
/// `target_rate` is the sample rate the active protocol requires; the
/// capture resamples from the device's native rate when they differ.
pub fn create_capture(
    config: &AudioConfig,
    target_rate: u32,
) -> Result<Box<dyn AudioCapture>, AudioError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(
        config,
        target_rate,
    )?))
}
