//! Pitch-class descriptors: chroma from the CQT and the STFT, CENS, and
//! the tonal centroid (tonnetz).

use super::transform::BINS_PER_OCTAVE;
use super::util::{hann_symmetric, n_fft_for_bins, normalize_columns, Norm};
use ndarray::Array2;
use std::f64::consts::PI;

/// Pitch classes per chroma vector.
pub const N_CHROMA: usize = 12;
/// Tonal centroid dimensions.
pub const N_TONNETZ: usize = 6;

const CENS_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];
const CENS_STEP_WEIGHT: f32 = 0.25;
const CENS_SMOOTHING: usize = 41;

/// Octave (relative to A0/16 reference) where the STFT chroma weighting peaks.
const CHROMA_CENTER_OCTAVE: f64 = 5.0;
const CHROMA_OCTAVE_WIDTH: f64 = 2.0;

/// Fold CQT bins onto pitch classes. The CQT starts at C1, so bin `k`
/// belongs to pitch class `k % 12` with C at index 0.
fn fold_cqt(cqt: &Array2<f32>) -> Array2<f32> {
    let per_chroma = BINS_PER_OCTAVE / N_CHROMA;
    let mut chroma = Array2::<f32>::zeros((N_CHROMA, cqt.ncols()));
    for (k, row) in cqt.rows().into_iter().enumerate() {
        let c = (k / per_chroma) % N_CHROMA;
        let mut dst = chroma.row_mut(c);
        dst += &row;
    }
    chroma
}

/// Chromagram from a CQT magnitude, each frame scaled to a peak of 1.
pub fn chroma_cqt(cqt: &Array2<f32>) -> Array2<f32> {
    normalize_columns(fold_cqt(cqt), Norm::Max)
}

/// Chroma Energy Normalized Statistics from a CQT magnitude.
///
/// L1-normalized chroma is quantized on a logarithmic-ish ladder, smoothed
/// over 41 frames with a Hann window, then L2-normalized per frame.
pub fn chroma_cens(cqt: &Array2<f32>) -> Array2<f32> {
    let chroma = normalize_columns(fold_cqt(cqt), Norm::L1);

    let quantized = chroma.mapv(|v| {
        CENS_STEPS
            .iter()
            .filter(|&&step| v > step)
            .count() as f32
            * CENS_STEP_WEIGHT
    });

    let smoothed = smooth_frames(&quantized, CENS_SMOOTHING);
    normalize_columns(smoothed, Norm::L2)
}

/// Convolve each row with a unit-sum Hann window of `win_len` interior
/// points, zero beyond the edges, output aligned with the input.
fn smooth_frames(a: &Array2<f32>, win_len: usize) -> Array2<f32> {
    let window = hann_symmetric(win_len + 2);
    let total: f64 = window.iter().sum();
    let window: Vec<f32> = window.iter().map(|w| (w / total) as f32).collect();
    let center = window.len() / 2;

    let n = a.ncols() as isize;
    let mut out = Array2::<f32>::zeros(a.raw_dim());
    for (src, mut dst) in a.rows().into_iter().zip(out.rows_mut()) {
        for t in 0..n {
            let mut acc = 0.0f32;
            for (j, w) in window.iter().enumerate() {
                let s = t + j as isize - center as isize;
                if s >= 0 && s < n {
                    acc += w * src[s as usize];
                }
            }
            dst[t as usize] = acc;
        }
    }
    out
}

/// Tonal centroid features: projections of the L1-normalized chroma onto
/// the circles of fifths, minor thirds and major thirds.
pub fn tonnetz(chroma: &Array2<f32>) -> Array2<f32> {
    const SCALE: [f64; N_TONNETZ] = [7.0 / 6.0, 7.0 / 6.0, 1.5, 1.5, 2.0 / 3.0, 2.0 / 3.0];
    const RADIUS: [f64; N_TONNETZ] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    let n_chroma = chroma.nrows();
    let phi = Array2::from_shape_fn((N_TONNETZ, n_chroma), |(r, c)| {
        let step = c as f64 * 12.0 / n_chroma as f64;
        let mut v = SCALE[r] * step;
        if r % 2 == 0 {
            v -= 0.5;
        }
        (RADIUS[r] * (PI * v).cos()) as f32
    });

    phi.dot(&normalize_columns(chroma.clone(), Norm::L1))
}

/// Chromagram from a power spectrogram (`bins × frames`), each frame scaled
/// to a peak of 1. `sample_rate` sets the frequency axis of the bins.
/// Uses the fixed A440 bank from [`chroma_filter_bank`].
pub fn chroma_stft(power: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let n_fft = n_fft_for_bins(power.nrows());
    let filters = chroma_filter_bank(sample_rate, n_fft);
    normalize_columns(filters.dot(power), Norm::Max)
}

/// Gaussian chroma filter bank, `12 × (n_fft / 2 + 1)`, at A440 tuning.
///
/// Each FFT bin spreads its energy over nearby pitch classes with a width
/// set by the bin spacing, and bins far from octave 5 are down-weighted.
/// Tuning is not estimated from the input: a detuned recording is split
/// between neighbouring pitch classes rather than re-centred.
pub fn chroma_filter_bank(sample_rate: u32, n_fft: usize) -> Array2<f32> {
    let n_chroma = N_CHROMA as f64;
    let reference = 440.0 / 16.0;

    // Fractional chroma position of every FFT bin except DC
    let mut positions: Vec<f64> = (1..n_fft)
        .map(|k| {
            let freq = k as f64 * sample_rate as f64 / n_fft as f64;
            n_chroma * (freq / reference).log2()
        })
        .collect();
    // DC gets a position 1.5 octaves below bin 1
    positions.insert(0, positions[0] - 1.5 * n_chroma);

    let mut widths: Vec<f64> = positions
        .windows(2)
        .map(|w| (w[1] - w[0]).max(1.0))
        .collect();
    widths.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = Array2::<f64>::zeros((N_CHROMA, n_fft));
    for (i, (&pos, &width)) in positions.iter().zip(&widths).enumerate() {
        for c in 0..N_CHROMA {
            let d = (pos - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            weights[[c, i]] = (-0.5 * (2.0 * d / width).powi(2)).exp();
        }
    }

    // Unit L2 norm per bin, then the octave emphasis
    for (i, mut col) in weights.columns_mut().into_iter().enumerate() {
        let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        let octave = positions[i] / n_chroma;
        let emphasis =
            (-0.5 * ((octave - CHROMA_CENTER_OCTAVE) / CHROMA_OCTAVE_WIDTH).powi(2)).exp();
        let scale = if norm > 0.0 { emphasis / norm } else { emphasis };
        col.mapv_inplace(|v| v * scale);
    }

    // Rotate so index 0 is C rather than A
    let n_bins = n_fft / 2 + 1;
    Array2::from_shape_fn((N_CHROMA, n_bins), |(c, i)| {
        weights[[(c + 3) % N_CHROMA, i]] as f32
    })
}
