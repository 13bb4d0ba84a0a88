use ndarray::Array2;
use std::f64::consts::PI;

/// Column norm used when normalizing a (bins × frames) array frame by frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    L1,
    L2,
    Max,
}

/// Normalize every column (frame) of `a` to unit `norm`.
///
/// Columns whose norm is below the smallest positive `f32` are left as they
/// are, so silent frames stay all-zero instead of turning into NaN.
pub fn normalize_columns(mut a: Array2<f32>, norm: Norm) -> Array2<f32> {
    for mut col in a.columns_mut() {
        let n = match norm {
            Norm::L1 => col.iter().map(|v| v.abs()).sum::<f32>(),
            Norm::L2 => col.iter().map(|v| v * v).sum::<f32>().sqrt(),
            Norm::Max => col.iter().fold(0.0f32, |m, v| m.max(v.abs())),
        };
        if n >= f32::MIN_POSITIVE {
            col.mapv_inplace(|v| v / n);
        }
    }
    a
}

/// Center frequency (Hz) of each of the `n_fft / 2 + 1` real FFT bins.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|k| (k as f64 * sample_rate as f64 / n_fft as f64) as f32)
        .collect()
}

/// FFT size implied by a one-sided spectrogram with `bins` rows.
pub fn n_fft_for_bins(bins: usize) -> usize {
    2 * bins.saturating_sub(1)
}

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Convert a power spectrogram to decibels relative to 1.0.
///
/// Values are floored at `1e-10` before the log, and the result is clipped
/// to no more than 80 dB below the array's peak.
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let mut db = power.mapv(|v| 10.0 * v.max(AMIN).log10());
    let peak = db.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let floor = peak - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}

/// Periodic Hann window, the variant used for spectral analysis.
pub fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Symmetric Hann window (zero at both ends), used for smoothing.
pub fn hann_symmetric(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
