//! # Audio Capture Module
//!
//! This module handles audio capture for the tuning loop. The loop only sees
//! the [`AudioSource`] trait: ask for `chunk_size` samples, block until they
//! arrive, get raw native-endian 16-bit PCM bytes back.
//!
//! ## Features
//! - [`CpalSource`]: default input device through CPAL, mono, 16-bit
//! - Automatic I16 / F32 device format handling
//! - Closures implement [`AudioSource`] for scripted sources in tests

use std::time::Duration;

use anyhow::{Result as AnyResult, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{Result, TunerError};

/// Something that delivers fixed-size buffers of mono 16-bit PCM.
pub trait AudioSource {
    /// Blocks until `chunk_size` samples are available and returns them as
    /// native-endian `i16` bytes.
    ///
    /// A well-behaved source returns exactly `2 * chunk_size` bytes; the
    /// tuning loop checks this and drops short or long buffers.
    fn read_buffer(&mut self, chunk_size: usize) -> Result<Vec<u8>>;
}

impl<F> AudioSource for F
where
    F: FnMut(usize) -> Result<Vec<u8>>,
{
    fn read_buffer(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        self(chunk_size)
    }
}

/// Reinterprets raw capture bytes as native-endian `i16` samples.
///
/// A trailing odd byte is ignored; use [`decode_capture`] to reject it.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

/// Decodes one capture buffer, which must hold exactly `chunk_size` samples.
///
/// # Errors
/// * `CaptureSizeMismatch` - the byte count is not `2 * chunk_size`,
///   including a buffer with a trailing odd byte
pub fn decode_capture(bytes: &[u8], chunk_size: usize) -> Result<Vec<i16>> {
    let expected = 2 * chunk_size;
    if bytes.len() != expected {
        return Err(TunerError::CaptureSizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes_to_samples(bytes))
}

/// Encodes samples the way a capture device hands them over.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}

/// Live capture from the default input device.
///
/// The CPAL stream is not `Send` on every platform, so a `CpalSource` must be
/// opened on the thread that reads from it.
pub struct CpalSource {
    stream: cpal::Stream,
    receiver: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    sample_rate: u32,
}

impl CpalSource {
    /// Opens the default input device at `sample_rate` Hz, mono.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks a mono configuration supporting the requested rate,
    ///    preferring 16-bit integer samples over 32-bit float
    /// 3. Starts a stream whose callback forwards every block to the reader
    pub fn open(sample_rate: u32) -> AnyResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("[AUDIO] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, sample_rate)
            .ok_or_else(|| anyhow!("No mono input format supports {} Hz", sample_rate))?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();

        log::info!(
            "[AUDIO] Selected {} Hz, {:?} samples",
            config.sample_rate.0,
            sample_format
        );

        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<i16>>();
        let err_fn = |err| log::error!("[AUDIO] An error occurred on the audio stream: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // The reader may already be gone during shutdown.
                    let _ = sender.send(data.to_vec());
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let block = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let _ = sender.send(block);
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow!("Unsupported sample format {:?}", other)),
        };

        stream.play()?;

        Ok(Self {
            stream,
            receiver,
            pending: Vec::new(),
            sample_rate,
        })
    }

    /// Longest wait for a full buffer before the device is declared stalled.
    fn capture_timeout(&self, chunk_size: usize) -> Duration {
        let chunk = chunk_size as f64 / self.sample_rate.max(1) as f64;
        Duration::from_secs_f64(2.0 * chunk + 1.0)
    }
}

impl AudioSource for CpalSource {
    /// Returns the most recent `chunk_size` samples.
    ///
    /// Audio that piled up while the previous buffer was being analysed is
    /// discarded, so every buffer reflects what is being played now.
    fn read_buffer(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        loop {
            match self.receiver.try_recv() {
                Ok(block) => self.pending.extend_from_slice(&block),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(TunerError::Capture("audio stream closed".to_string()));
                }
            }
        }

        let timeout = self.capture_timeout(chunk_size);
        while self.pending.len() < chunk_size {
            match self.receiver.recv_timeout(timeout) {
                Ok(block) => self.pending.extend_from_slice(&block),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(TunerError::Capture(format!(
                        "no audio for {:.1} s",
                        timeout.as_secs_f64()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TunerError::Capture("audio stream closed".to_string()));
                }
            }
        }

        let start = self.pending.len() - chunk_size;
        let bytes = samples_to_bytes(&self.pending[start..]);
        self.pending.clear();
        Ok(bytes)
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        // Properly stop the stream before dropping it
        if let Err(e) = self.stream.pause() {
            log::warn!("[AUDIO] Error pausing stream: {}", e);
        }
    }
}

/// Finds a mono configuration whose sample rate range contains the target.
///
/// Among those, 16-bit integer formats win over 32-bit float; other formats
/// are never chosen.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            c.channels() == 1
                && c.min_sample_rate().0 <= target_rate
                && target_rate <= c.max_sample_rate().0
        })
        .filter_map(|c| match c.sample_format() {
            SampleFormat::I16 => Some((0, c)),
            SampleFormat::F32 => Some((1, c)),
            _ => None,
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c)
}
