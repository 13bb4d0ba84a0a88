//! Mel filter bank, mel spectrogram and MFCCs.

use super::util::{fft_frequencies, n_fft_for_bins};
use ndarray::Array2;
use std::f64::consts::PI;

/// Mel bands in the spectrogram fed to the cepstral transform.
pub const N_MELS: usize = 128;
/// Cepstral coefficients kept.
pub const N_MFCC: usize = 20;

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filter bank, `n_mels × (n_fft / 2 + 1)`, spanning 0 Hz to
/// Nyquist with Slaney area normalization.
pub fn mel_filter_bank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, fft_freqs.len()));
    for m in 0..n_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let f = f as f64;
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            let w = lower.min(upper).max(0.0);
            weights[[m, k]] = (w * enorm) as f32;
        }
    }
    weights
}

/// Mel-scaled power spectrogram from a one-sided power spectrogram.
pub fn melspectrogram(power: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let n_fft = n_fft_for_bins(power.nrows());
    mel_filter_bank(sample_rate, n_fft, N_MELS).dot(power)
}

/// Orthonormal DCT-II basis, `n_out × n_in`.
fn dct_basis(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        (scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()) as f32
    })
}

/// First `n_mfcc` cepstral coefficients of a log-power mel spectrogram.
pub fn mfcc(log_mel: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    dct_basis(n_mfcc, log_mel.nrows()).dot(log_mel)
}
