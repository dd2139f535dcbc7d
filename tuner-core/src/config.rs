//! # Configuration Module
//!
//! Every knob of the tuner in one serde-friendly struct. Missing fields in a
//! JSON file fall back to the defaults below.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::tuning::{HALVING_NOTE, ReferenceTable};

/// Default capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 22050;

/// Capture is mono only.
pub const CHANNELS: u16 = 1;

/// Samples per analysis buffer.
///
/// About 1.5 s of audio at 22050 Hz, giving a bin width of ~0.67 Hz.
pub const CHUNK_SIZE: usize = 32768;

/// Runtime configuration for the tuning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_size: usize,
    pub references: ReferenceTable,
    /// Half-width of the in-tune band, Hz.
    pub tolerance: f64,
    /// Lower edge of the band searched for the dominant frequency, Hz.
    pub min_freq: f64,
    /// Upper edge of the band searched for the dominant frequency, Hz.
    pub max_freq: f64,
    /// Low-pass cutoff, Hz.
    pub filter_cutoff: f64,
    pub filter_order: usize,
    /// Pause between two analysis cycles, milliseconds.
    pub reschedule_delay_ms: u64,
    /// String whose reported frequency is halved (second harmonic pickup).
    pub halving_note: Option<String>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            chunk_size: CHUNK_SIZE,
            references: ReferenceTable::standard(),
            tolerance: 1.0,
            min_freq: 70.0,
            max_freq: 350.0,
            filter_cutoff: 350.0,
            filter_order: 5,
            reschedule_delay_ms: 100,
            halving_note: Some(HALVING_NOTE.to_string()),
        }
    }
}

impl TunerConfig {
    /// Loads a configuration from a JSON file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: TunerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the validated defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("[CONFIG] Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            log::info!("[CONFIG] {} not found, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn nyquist(&self) -> f64 {
        0.5 * self.sample_rate as f64
    }

    pub fn reschedule_delay(&self) -> Duration {
        Duration::from_millis(self.reschedule_delay_ms)
    }

    /// Checks every value the pipeline depends on.
    ///
    /// These are startup errors: the tuning loop must not start with a
    /// configuration that fails here.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TunerError::Config("sample rate must be positive".to_string()));
        }
        if self.channels != CHANNELS {
            return Err(TunerError::Config(format!(
                "only mono capture is supported, got {} channels",
                self.channels
            )));
        }
        if self.chunk_size < 2 {
            return Err(TunerError::Config(format!(
                "chunk size must be at least 2 samples, got {}",
                self.chunk_size
            )));
        }
        let nyquist = self.nyquist();
        if !(self.filter_cutoff > 0.0 && self.filter_cutoff < nyquist) {
            return Err(TunerError::InvalidFilterConfig {
                cutoff: self.filter_cutoff,
                nyquist,
            });
        }
        if self.filter_order == 0 {
            return Err(TunerError::InvalidFilterOrder(self.filter_order));
        }
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq) {
            return Err(TunerError::Config(format!(
                "band of interest [{}, {}] Hz is empty",
                self.min_freq, self.max_freq
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(TunerError::Config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if let Some(name) = &self.halving_note {
            if self.references.get(name).is_none() {
                return Err(TunerError::Config(format!(
                    "halving note {} is not in the reference table",
                    name
                )));
            }
        }
        Ok(())
    }
}
