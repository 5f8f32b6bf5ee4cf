//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input. Works with
//! PipeWire, PulseAudio, ALSA and CoreAudio backends.
//!
//! Note: cpal::Stream is not Send, so the stream lives on a dedicated
//! thread and chunks flow out through a channel. The device is opened at
//! its native rate and resampled to the protocol's rate on the fly, so any
//! hardware works without manual configuration.

use super::{AudioCapture, AudioChunk};
use crate::config::AudioConfig;
use crate::error::AudioError;
use std::thread;
use tokio::sync::mpsc;

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop,
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    config: AudioConfig,
    target_rate: u32,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig, target_rate: u32) -> Result<Self, AudioError> {
        Ok(Self {
            config: config.clone(),
            target_rate,
            cmd_tx: None,
            thread_handle: None,
        })
    }
}

/// Find an audio input device by name. Falls back to substring matching so
/// short PipeWire/PulseAudio names work.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();
    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_name || name.to_lowercase().contains(&search_lower) {
                tracing::debug!("Found audio device: {}", name);
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound(device_name.to_string()))
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let source_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let sample_format = supported_config.sample_format();
        let target_rate = self.target_rate;

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_rate,
            source_channels,
            sample_format
        );
        if source_rate != target_rate {
            tracing::info!("Resampling audio {} Hz -> {} Hz", source_rate, target_rate);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();

        // Fixed chunk size in samples at the target rate
        let chunk_samples =
            ((target_rate as u64 * self.config.chunk_ms as u64) / 1000).max(1) as usize;

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);
            let chunker = Chunker::new(chunk_samples, chunk_tx);

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(
                    &device,
                    &stream_config,
                    chunker,
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::I16 => build_stream::<i16>(
                    &device,
                    &stream_config,
                    chunker,
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::U16 => build_stream::<u16>(
                    &device,
                    &stream_config,
                    chunker,
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                return;
            }

            tracing::debug!("Audio capture thread started");

            // Park until stop; dropping the stream closes the device.
            let _ = cmd_rx.recv();
            drop(stream);

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(chunk_rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(CaptureCommand::Stop);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
        Ok(())
    }
}

/// Accumulates resampled mono samples into fixed-size PCM16 chunks.
struct Chunker {
    chunk_samples: usize,
    buffer: Vec<f32>,
    tx: mpsc::Sender<AudioChunk>,
}

impl Chunker {
    fn new(chunk_samples: usize, tx: mpsc::Sender<AudioChunk>) -> Self {
        Self {
            chunk_samples,
            buffer: Vec::with_capacity(chunk_samples * 2),
            tx,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
        while self.buffer.len() >= self.chunk_samples {
            let rest = self.buffer.split_off(self.chunk_samples);
            let chunk: Vec<f32> = std::mem::replace(&mut self.buffer, rest);

            let level =
                chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len().max(1) as f32;
            let pcm: Vec<u8> = chunk
                .iter()
                .flat_map(|&s| {
                    let scaled = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    scaled.to_le_bytes()
                })
                .collect();

            // Receiver may be gone or slow; dropping here is the
            // backpressure policy for a realtime source.
            let _ = self.tx.try_send(AudioChunk {
                pcm,
                level: level.min(1.0),
            });
        }
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut chunker: Chunker,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                chunker.push(&resampled);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling. Good enough for speech feeding a
/// transcription model, not hi-fi playback.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let result = resample(&samples, 16000, 16000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        // 3:1 ratio, so 8 samples -> ~3 samples
        assert!(result.len() >= 2 && result.len() <= 4);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![1.0, 2.0];
        let result = resample(&samples, 8000, 16000);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_resample_empty() {
        let samples: Vec<f32> = vec![];
        let result = resample(&samples, 48000, 16000);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_chunker_emits_fixed_pcm16_chunks() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut chunker = Chunker::new(4, tx);
        chunker.push(&[0.0, 0.5, -0.5, 1.0, 0.25]);

        let chunk = rx.recv().await.unwrap();
        // 4 samples * 2 bytes each
        assert_eq!(chunk.pcm.len(), 8);
        assert!(chunk.level > 0.0 && chunk.level <= 1.0);

        // The fifth sample is retained for the next chunk.
        chunker.push(&[0.0, 0.0, 0.0]);
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.pcm.len(), 8);
    }

    #[tokio::test]
    async fn test_chunker_pcm_is_little_endian() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut chunker = Chunker::new(1, tx);
        chunker.push(&[1.0]);
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.pcm, i16::MAX.to_le_bytes().to_vec());
    }
}
