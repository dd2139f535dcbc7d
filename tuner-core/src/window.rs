//! # Window Module
//!
//! Hamming taper applied to each analysis buffer before the FFT to reduce
//! spectral leakage from the buffer edges.

use std::f64::consts::PI;

/// Symmetric Hamming coefficients, `0.54 - 0.46 cos(2πn / (N - 1))`.
///
/// A single-point window is `[1.0]`.
pub fn hamming(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let n_minus_1 = (len - 1) as f64;
            (0..len)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n_minus_1).cos())
                .collect()
        }
    }
}

/// Applies a Hamming window to the buffer in place.
pub fn apply_hamming_window(buffer: &mut [f64]) {
    let window = hamming(buffer.len());
    for (sample, w) in buffer.iter_mut().zip(window) {
        *sample *= w;
    }
}
