//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency domain analysis of one windowed buffer and the search for the
//! strongest component inside the band where guitar fundamentals live.
//!
//! ## Features
//! - Real-input FFT via RealFFT (N/2 + 1 bins, 0 Hz to Nyquist)
//! - Magnitude spectrum with matching bin frequencies
//! - Band-limited dominant peak search with stable tie-breaking

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::error::{Result, TunerError};

/// Magnitude versus frequency for one buffer.
///
/// Both vectors always have the same length and frequencies never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
}

impl Spectrum {
    /// Builds a spectrum from a complex real-FFT output.
    ///
    /// `signal_len` is the length of the time-domain buffer, which sets the
    /// bin spacing `sample_rate / signal_len`.
    pub fn from_complex(bins: &[Complex<f64>], signal_len: usize, sample_rate: f64) -> Self {
        let bin_width = bin_width(signal_len, sample_rate);
        let frequencies = (0..bins.len()).map(|k| k as f64 * bin_width).collect();
        let magnitudes = bins.iter().map(|c| c.norm()).collect(); // .norm() is sqrt(re^2 + im^2)
        Self {
            frequencies,
            magnitudes,
        }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Iterates `(frequency, magnitude)` pairs in ascending frequency.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.magnitudes.iter().copied())
    }
}

/// Frequency resolution of an FFT over `signal_len` samples.
pub fn bin_width(signal_len: usize, sample_rate: f64) -> f64 {
    if signal_len == 0 {
        0.0
    } else {
        sample_rate / signal_len as f64
    }
}

/// A planned real-input FFT for a fixed buffer length.
///
/// Planning is done once; each call to [`SpectralAnalyzer::analyze`] reuses
/// the plan and its scratch buffers are allocated per call.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    len: usize,
    sample_rate: f64,
    r2c: Arc<dyn RealToComplex<f64>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("len", &self.len)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Plans a forward FFT for buffers of `len` samples.
    pub fn new(len: usize, sample_rate: f64) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(len);
        Self {
            len,
            sample_rate,
            r2c,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Computes the magnitude spectrum of `signal`.
    ///
    /// # Errors
    /// * `Fft` - `signal` is not exactly the planned length
    pub fn analyze(&self, signal: &[f64]) -> Result<Spectrum> {
        if signal.len() != self.len {
            return Err(TunerError::Fft(format!(
                "planned for {} samples, got {}",
                self.len,
                signal.len()
            )));
        }
        let mut input = self.r2c.make_input_vec();
        input.copy_from_slice(signal);
        let mut output = self.r2c.make_output_vec();
        self.r2c
            .process(&mut input, &mut output)
            .map_err(|e| TunerError::Fft(e.to_string()))?;
        Ok(Spectrum::from_complex(&output, self.len, self.sample_rate))
    }
}

/// Computes the magnitude spectrum of a real buffer with a one-off plan.
pub fn compute_spectrum(signal: &[f64], sample_rate: f64) -> Result<Spectrum> {
    if signal.is_empty() {
        return Ok(Spectrum::from_complex(&[], 0, sample_rate));
    }
    SpectralAnalyzer::new(signal.len(), sample_rate).analyze(signal)
}

/// The strongest spectral component inside the band of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantPeak {
    pub frequency: f64,
    pub magnitude: f64,
}

/// Finds the bin with the largest magnitude among bins with
/// `min_freq <= frequency <= max_freq`.
///
/// Returns `None` when no bin falls inside the band. On equal magnitudes the
/// lowest bin wins.
pub fn dominant_frequency(spectrum: &Spectrum, min_freq: f64, max_freq: f64) -> Option<DominantPeak> {
    spectrum
        .bins()
        .filter(|&(freq, _)| freq >= min_freq && freq <= max_freq)
        .fold(None, |best: Option<DominantPeak>, (frequency, magnitude)| match best {
            Some(peak) if magnitude <= peak.magnitude => Some(peak),
            _ => Some(DominantPeak {
                frequency,
                magnitude,
            }),
        })
}
