//! # Low-Pass Filter Module
//!
//! Digital Butterworth low-pass and a causal IIR filter to apply it. The
//! filter strips energy above the band of interest (upper harmonics, hiss)
//! before the spectrum is taken.
//!
//! An order `n` Butterworth is built as a cascade of `biquad` sections: one
//! second-order low-pass per conjugate pole pair, each with its own Q, plus a
//! single-pole section when `n` is odd. Every section is pre-warped to the
//! same cutoff, so the cascade has the same response as the direct
//! `butter(n, Wn, 'low')` transfer function.

use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::{Result, TunerError};

/// Butterworth low-pass as a cascade of second-order sections.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    sections: Vec<Coefficients<f64>>,
    order: usize,
}

impl LowpassFilter {
    /// Designs a Butterworth low-pass filter.
    ///
    /// # Arguments
    /// * `cutoff` - -3 dB frequency in Hz
    /// * `sample_rate` - Sample rate in Hz
    /// * `order` - Number of poles
    ///
    /// # Errors
    /// * `InvalidFilterConfig` - `cutoff` is not strictly inside `(0, sample_rate / 2)`
    /// * `InvalidFilterOrder` - `order` is zero
    pub fn design(cutoff: f64, sample_rate: f64, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(TunerError::InvalidFilterOrder(order));
        }
        let nyquist = 0.5 * sample_rate;
        if !(cutoff > 0.0 && cutoff < nyquist) {
            return Err(TunerError::InvalidFilterConfig { cutoff, nyquist });
        }

        let section = |filter_type: Type<f64>, q: f64| {
            Coefficients::<f64>::from_params(filter_type, sample_rate.hz(), cutoff.hz(), q)
                .map_err(|_| TunerError::InvalidFilterConfig { cutoff, nyquist })
        };

        let mut sections = (0..order / 2)
            .map(|k| section(Type::LowPass, butterworth_q(order, k)))
            .collect::<Result<Vec<_>>>()?;
        if order % 2 == 1 {
            sections.push(section(Type::SinglePoleLowPass, 0.5)?);
        }

        Ok(Self { sections, order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Coefficients of each section, in the order they are applied.
    pub fn sections(&self) -> &[Coefficients<f64>] {
        &self.sections
    }

    /// Runs the filter over `signal` from a zero initial state.
    ///
    /// Each section is direct form II transposed. The output has the same
    /// length as the input.
    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        let mut stages: Vec<DirectForm2Transposed<f64>> = self
            .sections
            .iter()
            .map(|&coeffs| DirectForm2Transposed::<f64>::new(coeffs))
            .collect();

        signal
            .iter()
            .map(|&x| stages.iter_mut().fold(x, |acc, stage| stage.run(acc)))
            .collect()
    }

    /// Gain at 0 Hz.
    pub fn dc_gain(&self) -> f64 {
        self.sections
            .iter()
            .map(|c| (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2))
            .product()
    }
}

/// Q of the `k`-th conjugate pole pair of an order `order` Butterworth.
fn butterworth_q(order: usize, k: usize) -> f64 {
    let angle = (2 * k + 1) as f64 * PI / (2 * order) as f64;
    1.0 / (2.0 * angle.sin())
}

/// Designs and applies a Butterworth low-pass in one call.
///
/// Nothing is cached: every call re-designs the filter from its arguments.
pub fn lowpass_filter(
    signal: &[f64],
    cutoff: f64,
    sample_rate: f64,
    order: usize,
) -> Result<Vec<f64>> {
    let filter = LowpassFilter::design(cutoff, sample_rate, order)?;
    Ok(filter.apply(signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn peak(signal: &[f64]) -> f64 {
        signal.iter().fold(0.0, |m: f64, &x| m.max(x.abs()))
    }

    #[test]
    fn fifth_order_uses_two_pairs_and_one_real_pole() {
        let filter = LowpassFilter::design(350.0, 22050.0, 5).unwrap();
        assert_eq!(filter.order(), 5);
        assert_eq!(filter.sections().len(), 3);
        assert!((butterworth_q(5, 0) - 1.618_034).abs() < 1e-6);
        assert!((butterworth_q(5, 1) - 0.618_034).abs() < 1e-6);

        let single_pole = &filter.sections()[2];
        assert_eq!(single_pole.a2, 0.0);
        assert_eq!(single_pole.b2, 0.0);
    }

    #[test]
    fn second_order_half_band_coefficients() {
        // butter(2, 0.5): b = [0.2929, 0.5858, 0.2929], a = [1, 0, 0.1716]
        let filter = LowpassFilter::design(0.5, 2.0, 2).unwrap();
        assert_eq!(filter.sections().len(), 1);
        let c = &filter.sections()[0];
        assert!((c.b0 - 0.292_893_218_8).abs() < 1e-9, "b0 {}", c.b0);
        assert!((c.b1 - 0.585_786_437_6).abs() < 1e-9, "b1 {}", c.b1);
        assert!((c.b2 - 0.292_893_218_8).abs() < 1e-9, "b2 {}", c.b2);
        assert!(c.a1.abs() < 1e-9, "a1 {}", c.a1);
        assert!((c.a2 - 0.171_572_875_3).abs() < 1e-9, "a2 {}", c.a2);
    }

    #[test]
    fn unity_gain_at_dc() {
        for order in 1..=6 {
            let filter = LowpassFilter::design(350.0, 22050.0, order).unwrap();
            assert!(
                (filter.dc_gain() - 1.0).abs() < 1e-6,
                "order {order}: {}",
                filter.dc_gain()
            );
        }
    }

    #[test]
    fn output_length_matches_input() {
        for len in [0, 1, 7, 32768] {
            let out = lowpass_filter(&vec![1.0; len], 350.0, 22050.0, 5).unwrap();
            assert_eq!(out.len(), len);
        }
    }

    #[test]
    fn passes_low_and_attenuates_high_frequencies() {
        let sample_rate = 22050.0;
        let len = 8192;
        // Skip the start-up transient.
        let settled = len / 2;

        let low = lowpass_filter(&sine(110.0, sample_rate, len), 350.0, sample_rate, 5).unwrap();
        assert!(peak(&low[settled..]) > 0.9);

        let high = lowpass_filter(&sine(2000.0, sample_rate, len), 350.0, sample_rate, 5).unwrap();
        assert!(peak(&high[settled..]) < 0.01);
    }

    #[test]
    fn each_call_starts_from_rest() {
        let filter = LowpassFilter::design(350.0, 22050.0, 5).unwrap();
        let signal = sine(110.0, 22050.0, 512);
        assert_eq!(filter.apply(&signal), filter.apply(&signal));
    }

    #[test]
    fn rejects_cutoff_at_or_above_nyquist() {
        assert!(matches!(
            LowpassFilter::design(11025.0, 22050.0, 5),
            Err(TunerError::InvalidFilterConfig { .. })
        ));
        assert!(LowpassFilter::design(20000.0, 22050.0, 5).is_err());
        assert!(LowpassFilter::design(0.0, 22050.0, 5).is_err());
        assert!(matches!(
            LowpassFilter::design(350.0, 22050.0, 0),
            Err(TunerError::InvalidFilterOrder(0))
        ));
    }
}
