//! # Error Module
//!
//! Error kinds produced by the tuning pipeline and its configuration.
//! Only configuration errors are fatal; everything raised while the
//! tuning loop runs is logged and the cycle is skipped.

use thiserror::Error;

/// Errors raised by the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    /// The capture device delivered a buffer of the wrong length, in bytes.
    #[error("captured {actual} bytes, expected {expected}")]
    CaptureSizeMismatch { expected: usize, actual: usize },

    /// The low-pass cutoff is not strictly between 0 Hz and Nyquist.
    #[error("filter cutoff {cutoff} Hz must lie strictly between 0 and the Nyquist frequency {nyquist} Hz")]
    InvalidFilterConfig { cutoff: f64, nyquist: f64 },

    /// A Butterworth filter needs at least one pole.
    #[error("filter order must be at least 1, got {0}")]
    InvalidFilterOrder(usize),

    /// No spectral bin fell inside the band of interest.
    #[error("no spectral bin inside the band of interest")]
    NoDominantFrequency,

    /// The reference table breaks one of its invariants.
    #[error("invalid reference table: {0}")]
    InvalidReferenceTable(String),

    /// Any other configuration value out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The audio device failed or went away.
    #[error("audio capture failed: {0}")]
    Capture(String),

    /// The FFT backend rejected its buffers.
    #[error("fft failed: {0}")]
    Fft(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TunerError>;
