//! # Analysis Pipeline Module
//!
//! One analysis cycle, start to finish:
//! raw bytes → low-pass → Hamming window → FFT → dominant bin →
//! closest string → verdict.

use crate::audio::{AudioSource, decode_capture};
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::{DominantPeak, SpectralAnalyzer, dominant_frequency};
use crate::filter::{LowpassFilter, lowpass_filter};
use crate::state::{RunningFlag, VerdictBoard, VerdictUpdate};
use crate::tuning::{Classification, classify, format_label};
use crate::window::apply_hamming_window;

/// Result of analysing one buffer that produced a detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Strongest bin inside the band of interest.
    pub peak: DominantPeak,
    /// Name of the closest reference string.
    pub note: String,
    /// `|peak.frequency - reference|` in Hz.
    pub distance: f64,
    pub classification: Classification,
}

impl Detection {
    pub fn to_update(&self) -> VerdictUpdate {
        let verdict = self.classification.verdict;
        let frequency = self.classification.reported_frequency;
        VerdictUpdate {
            note: self.note.clone(),
            verdict,
            frequency: Some(frequency),
            cents_deviation: Some(self.classification.cents_deviation),
            label: format_label(&self.note, verdict, Some(frequency)),
        }
    }
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The running flag was off; nothing was captured and the loop must not
    /// reschedule.
    Stopped,
    /// A string was matched and its verdict updated.
    Updated(VerdictUpdate),
    /// No bin inside the band of interest; no verdict changed.
    NoDetection,
    /// Capture failed or delivered the wrong size; no verdict changed.
    Skipped(TunerError),
}

impl CycleOutcome {
    /// Whether the loop should run another cycle after the delay.
    pub fn reschedule(&self) -> bool {
        !matches!(self, CycleOutcome::Stopped)
    }
}

/// The signal chain for one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TunerConfig,
    analyzer: SpectralAnalyzer,
}

impl Pipeline {
    /// Validates `config` and plans the FFT.
    ///
    /// # Errors
    /// Any configuration error, including `InvalidFilterConfig` when the
    /// cutoff is not below Nyquist.
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        // Fail now rather than on the first cycle.
        LowpassFilter::design(
            config.filter_cutoff,
            config.sample_rate as f64,
            config.filter_order,
        )?;
        let analyzer = SpectralAnalyzer::new(config.chunk_size, config.sample_rate as f64);
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Runs the signal chain over one buffer of samples.
    ///
    /// # Errors
    /// * `NoDominantFrequency` - no spectral bin falls inside the band of interest
    pub fn analyze(&self, samples: &[i16]) -> Result<Detection> {
        let config = &self.config;
        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();

        let mut filtered = lowpass_filter(
            &signal,
            config.filter_cutoff,
            config.sample_rate as f64,
            config.filter_order,
        )?;
        apply_hamming_window(&mut filtered);

        let spectrum = self.analyzer.analyze(&filtered)?;
        let peak = dominant_frequency(&spectrum, config.min_freq, config.max_freq)
            .ok_or(TunerError::NoDominantFrequency)?;

        let (note, distance) = config
            .references
            .find_closest_string(peak.frequency)
            .ok_or_else(|| TunerError::InvalidReferenceTable("table has no entries".to_string()))?;

        let classification = classify(
            peak.frequency,
            note,
            distance,
            config.tolerance,
            config.halving_note.as_deref(),
        );

        Ok(Detection {
            peak,
            note: note.name.clone(),
            distance,
            classification,
        })
    }

    /// Runs one full cycle: check the flag, capture, analyse, record.
    ///
    /// Never panics on bad input and never returns an error: every failure
    /// after startup is logged and turned into a skipped update.
    pub fn run_cycle(
        &self,
        source: &mut dyn AudioSource,
        running: &RunningFlag,
        board: &mut VerdictBoard,
    ) -> CycleOutcome {
        if !running.is_running() {
            return CycleOutcome::Stopped;
        }

        let chunk_size = self.config.chunk_size;
        let bytes = match source.read_buffer(chunk_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("[CYCLE] Capture failed: {}", e);
                return CycleOutcome::Skipped(e);
            }
        };

        let samples = match decode_capture(&bytes, chunk_size) {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("[CYCLE] Unexpected buffer size: {}", e);
                return CycleOutcome::Skipped(e);
            }
        };

        match self.analyze(&samples) {
            Ok(detection) => {
                log::debug!(
                    "[CYCLE] Dominant {:.2} Hz -> {} ({:.2} Hz away)",
                    detection.peak.frequency,
                    detection.note,
                    detection.distance
                );
                let update = detection.to_update();
                board.apply(&update);
                CycleOutcome::Updated(update)
            }
            Err(TunerError::NoDominantFrequency) => {
                log::debug!("[CYCLE] No dominant frequency in band");
                CycleOutcome::NoDetection
            }
            Err(e) => {
                log::warn!("[CYCLE] Analysis failed: {}", e);
                CycleOutcome::Skipped(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::Verdict;

    #[test]
    fn rejects_cutoff_above_nyquist_at_construction() {
        let config = TunerConfig {
            filter_cutoff: 12000.0,
            ..TunerConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(TunerError::InvalidFilterConfig { .. })
        ));
    }

    #[test]
    fn silence_detects_the_lowest_bin_without_panicking() {
        let config = TunerConfig {
            chunk_size: 4096,
            ..TunerConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let detection = pipeline.analyze(&vec![0; 4096]).unwrap();
        assert_eq!(detection.peak.magnitude, 0.0);
        assert!(detection.peak.frequency >= 70.0);
    }

    #[test]
    fn band_without_bins_is_no_detection() {
        // 16 samples at 22050 Hz: bins every ~1378 Hz, none in 70-350 Hz.
        let config = TunerConfig {
            chunk_size: 16,
            ..TunerConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.analyze(&[100; 16]),
            Err(TunerError::NoDominantFrequency)
        ));
    }

    #[test]
    fn stopped_cycle_does_not_capture() {
        let pipeline = Pipeline::new(TunerConfig::default()).unwrap();
        let running = RunningFlag::new();
        let mut board = VerdictBoard::new(&pipeline.config().references);
        let mut captured = false;
        let mut source = |_: usize| -> Result<Vec<u8>> {
            captured = true;
            Ok(Vec::new())
        };

        let outcome = pipeline.run_cycle(&mut source, &running, &mut board);
        assert!(matches!(outcome, CycleOutcome::Stopped));
        assert!(!outcome.reschedule());
        assert!(!captured);
        assert!(board.iter().all(|e| e.verdict == Verdict::Unknown));
    }

    #[test]
    fn odd_byte_count_skips_the_cycle() {
        let config = TunerConfig {
            chunk_size: 4096,
            ..TunerConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let running = RunningFlag::new();
        running.set(true);
        let mut board = VerdictBoard::new(&pipeline.config().references);
        let mut source = |chunk: usize| -> Result<Vec<u8>> {
            let mut bytes = crate::audio::samples_to_bytes(&vec![1000; chunk]);
            bytes.push(0);
            Ok(bytes)
        };

        let outcome = pipeline.run_cycle(&mut source, &running, &mut board);
        assert!(matches!(
            outcome,
            CycleOutcome::Skipped(TunerError::CaptureSizeMismatch {
                expected: 8192,
                actual: 8193
            })
        ));
        assert!(board.iter().all(|e| e.verdict == Verdict::Unknown));
    }

    #[test]
    fn capture_error_is_skipped_and_rescheduled() {
        let pipeline = Pipeline::new(TunerConfig::default()).unwrap();
        let running = RunningFlag::new();
        running.set(true);
        let mut board = VerdictBoard::new(&pipeline.config().references);
        let mut source =
            |_: usize| -> Result<Vec<u8>> { Err(TunerError::Capture("unplugged".to_string())) };

        let outcome = pipeline.run_cycle(&mut source, &running, &mut board);
        assert!(matches!(outcome, CycleOutcome::Skipped(TunerError::Capture(_))));
        assert!(outcome.reschedule());
    }
}
