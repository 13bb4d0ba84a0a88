//! Frame-wise spectral shape descriptors and the zero-crossing rate.

use super::util::{fft_frequencies, n_fft_for_bins, power_to_db};
use ndarray::Array2;

/// Samples at or below this magnitude count as zero when detecting sign changes.
const ZERO_THRESHOLD: f32 = 1e-10;

/// Contrast bands above the first cut at `CONTRAST_FMIN`.
pub const CONTRAST_BANDS: usize = 6;
const CONTRAST_FMIN: f32 = 200.0;
const CONTRAST_QUANTILE: f64 = 0.02;

/// Fraction of spectral energy below the rolloff frequency.
const ROLL_PERCENT: f32 = 0.85;

/// Fraction of sign changes per frame, `1 × frames`.
///
/// The signal is edge-padded by half a frame on each side so frames are
/// centered on hop positions. Zero counts as positive.
pub fn zero_crossing_rate(y: &[f32], frame_length: usize, hop: usize) -> Array2<f32> {
    let pad = frame_length / 2;
    let first = y.first().copied().unwrap_or(0.0);
    let last = y.last().copied().unwrap_or(0.0);

    let mut negative = Vec::with_capacity(y.len() + 2 * pad);
    let is_negative = |x: f32| x.abs() > ZERO_THRESHOLD && x < 0.0;
    negative.extend(std::iter::repeat_n(is_negative(first), pad));
    negative.extend(y.iter().map(|&x| is_negative(x)));
    negative.extend(std::iter::repeat_n(is_negative(last), pad));

    let n_frames = if negative.len() < frame_length {
        0
    } else {
        1 + (negative.len() - frame_length) / hop
    };

    let mut out = Array2::<f32>::zeros((1, n_frames));
    for t in 0..n_frames {
        let frame = &negative[t * hop..t * hop + frame_length];
        let crossings = frame.windows(2).filter(|w| w[0] != w[1]).count();
        out[[0, t]] = crossings as f32 / frame_length as f32;
    }
    out
}

/// Root-mean-square energy per frame from an STFT magnitude, `1 × frames`.
///
/// Uses Parseval over the one-sided spectrum: DC and Nyquist bins count once,
/// every other bin twice.
pub fn rms(magnitude: &Array2<f32>) -> Array2<f32> {
    let frame_length = n_fft_for_bins(magnitude.nrows()) as f32;
    let last = magnitude.nrows().saturating_sub(1);
    let mut out = Array2::<f32>::zeros((1, magnitude.ncols()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        let energy: f32 = col
            .iter()
            .enumerate()
            .map(|(k, &m)| {
                let p = m * m;
                if k == 0 || k == last { 0.5 * p } else { p }
            })
            .sum();
        out[[0, t]] = (2.0 * energy / (frame_length * frame_length)).sqrt();
    }
    out
}

/// Magnitude-weighted mean frequency per frame, `1 × frames`.
pub fn spectral_centroid(magnitude: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let freqs = fft_frequencies(sample_rate, n_fft_for_bins(magnitude.nrows()));
    let mut out = Array2::<f32>::zeros((1, magnitude.ncols()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        out[[0, t]] = centroid(col.iter().copied(), &freqs);
    }
    out
}

fn column_total(col: impl Iterator<Item = f32>) -> f32 {
    let total: f32 = col.map(f32::abs).sum();
    if total >= f32::MIN_POSITIVE { total } else { 1.0 }
}

fn centroid(col: impl Iterator<Item = f32> + Clone, freqs: &[f32]) -> f32 {
    let total = column_total(col.clone());
    col.zip(freqs).map(|(m, f)| m * f).sum::<f32>() / total
}

/// Second-order spectral bandwidth around the centroid, `1 × frames`.
pub fn spectral_bandwidth(magnitude: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let freqs = fft_frequencies(sample_rate, n_fft_for_bins(magnitude.nrows()));
    let mut out = Array2::<f32>::zeros((1, magnitude.ncols()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        let c = centroid(col.iter().copied(), &freqs);
        let total = column_total(col.iter().copied());
        let spread: f32 = col
            .iter()
            .zip(&freqs)
            .map(|(&m, &f)| (m / total) * (f - c).powi(2))
            .sum();
        out[[0, t]] = spread.sqrt();
    }
    out
}

/// Octave-band spectral contrast in dB, `(CONTRAST_BANDS + 1) × frames`.
///
/// For each band the mean of the top 2% of magnitudes (peak) is compared to
/// the mean of the bottom 2% (valley). Band edges run 0, 200, 400, ... Hz and
/// the last band absorbs everything up to Nyquist.
pub fn spectral_contrast(magnitude: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let freqs = fft_frequencies(sample_rate, n_fft_for_bins(magnitude.nrows()));
    let n_frames = magnitude.ncols();

    let mut edges = vec![0.0f32; CONTRAST_BANDS + 2];
    for (i, edge) in edges.iter_mut().enumerate().skip(1) {
        *edge = CONTRAST_FMIN * 2f32.powi(i as i32 - 1);
    }

    let mut peak = Array2::<f32>::zeros((CONTRAST_BANDS + 1, n_frames));
    let mut valley = Array2::<f32>::zeros((CONTRAST_BANDS + 1, n_frames));

    for k in 0..=CONTRAST_BANDS {
        let (lo, hi) = (edges[k], edges[k + 1]);
        let mut in_band: Vec<bool> = freqs.iter().map(|&f| f >= lo && f <= hi).collect();
        let first = in_band.iter().position(|&b| b);
        let last = in_band.iter().rposition(|&b| b);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        if k > 0 && first > 0 {
            in_band[first - 1] = true;
        }
        if k == CONTRAST_BANDS {
            for b in in_band.iter_mut().skip(last + 1) {
                *b = true;
            }
        }

        let mut rows: Vec<usize> = in_band
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();
        let band_size = rows.len();
        if k < CONTRAST_BANDS {
            rows.pop();
        }
        if rows.is_empty() {
            continue;
        }

        let take = ((CONTRAST_QUANTILE * band_size as f64).round_ties_even() as usize)
            .max(1)
            .min(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for t in 0..n_frames {
            values.clear();
            values.extend(rows.iter().map(|&r| magnitude[[r, t]]));
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            valley[[k, t]] = values[..take].iter().sum::<f32>() / take as f32;
            peak[[k, t]] = values[values.len() - take..].iter().sum::<f32>() / take as f32;
        }
    }

    power_to_db(&peak) - power_to_db(&valley)
}

/// Frequency below which `ROLL_PERCENT` of each frame's magnitude lies,
/// `1 × frames`.
pub fn spectral_rolloff(magnitude: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let freqs = fft_frequencies(sample_rate, n_fft_for_bins(magnitude.nrows()));
    let mut out = Array2::<f32>::zeros((1, magnitude.ncols()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        let total: f32 = col.sum();
        let threshold = ROLL_PERCENT * total;
        let mut cumulative = 0.0f32;
        let mut rolloff = freqs.last().copied().unwrap_or(0.0);
        for (&m, &f) in col.iter().zip(&freqs) {
            cumulative += m;
            if cumulative >= threshold {
                rolloff = f;
                break;
            }
        }
        out[[0, t]] = rolloff;
    }
    out
}
