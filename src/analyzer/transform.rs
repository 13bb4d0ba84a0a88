//! Time-frequency transforms: the STFT and the constant-Q transform.
//!
//! Both are centered analyses with zero padding of half the FFT size on each
//! side, so a signal of `L` samples at hop `h` yields `1 + L / h` frames.

use super::util::hann_periodic;
use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

/// Bins per octave of the constant-Q transform.
pub const BINS_PER_OCTAVE: usize = 12;
/// Octaves covered by the constant-Q transform.
pub const N_OCTAVES: usize = 7;
/// Total constant-Q bins.
pub const N_CQT_BINS: usize = BINS_PER_OCTAVE * N_OCTAVES;
/// Lowest constant-Q center frequency: C1 at A440 tuning.
pub const CQT_FMIN: f64 = 32.703_195_662_574_83;

/// Equivalent noise bandwidth of the Hann window, in bins.
const HANN_BANDWIDTH: f64 = 1.500_183_105_468_75;
/// Fraction of each filter's spectral mass that may be discarded.
const KERNEL_SPARSITY: f64 = 0.01;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(
        "Sample rate {sample_rate} Hz too low for the CQT: top filter reaches {cutoff:.1} Hz, above Nyquist"
    )]
    NyquistExceeded { sample_rate: u32, cutoff: f64 },
}

/// Reusable forward FFT over frames of a fixed length.
struct FrameFft {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FrameFft {
    fn new(n: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); n],
            scratch,
        }
    }

    /// Transform `frame` (optionally windowed) and return the full spectrum.
    fn process(&mut self, frame: &[f32], window: Option<&[f32]>) -> &[Complex<f32>] {
        match window {
            Some(w) => {
                for ((b, &x), &w) in self.buffer.iter_mut().zip(frame).zip(w) {
                    *b = Complex::new(x * w, 0.0);
                }
            }
            None => {
                for (b, &x) in self.buffer.iter_mut().zip(frame) {
                    *b = Complex::new(x, 0.0);
                }
            }
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer
    }
}

/// Zero-pad `y` by `pad` samples on both sides.
fn pad_constant(y: &[f32], pad: usize) -> Vec<f32> {
    let mut padded = vec![0.0f32; y.len() + 2 * pad];
    padded[pad..pad + y.len()].copy_from_slice(y);
    padded
}

fn frame_count(padded_len: usize, n_fft: usize, hop: usize) -> usize {
    if padded_len < n_fft {
        0
    } else {
        1 + (padded_len - n_fft) / hop
    }
}

/// Magnitude STFT with a periodic Hann window.
///
/// Returns a `(n_fft / 2 + 1) × frames` array.
pub fn stft_magnitude(y: &[f32], n_fft: usize, hop: usize) -> Array2<f32> {
    let window: Vec<f32> = hann_periodic(n_fft).into_iter().map(|w| w as f32).collect();
    let padded = pad_constant(y, n_fft / 2);
    let n_frames = frame_count(padded.len(), n_fft, hop);
    let n_bins = n_fft / 2 + 1;

    let mut fft = FrameFft::new(n_fft);
    let mut out = Array2::<f32>::zeros((n_bins, n_frames));
    for t in 0..n_frames {
        let start = t * hop;
        let spectrum = fft.process(&padded[start..start + n_fft], Some(window.as_slice()));
        for (k, c) in spectrum[..n_bins].iter().enumerate() {
            out[[k, t]] = c.norm();
        }
    }
    out
}

/// One constant-Q filter in the frequency domain, stored as the contiguous
/// run of bins that survived sparsification.
struct KernelRow {
    start: usize,
    weights: Vec<Complex<f32>>,
    /// `1 / sqrt(filter length)`, applied to the response.
    scale: f32,
}

/// Frequency-domain constant-Q filter bank for one sample rate.
pub struct CqtKernel {
    n_fft: usize,
    rows: Vec<KernelRow>,
}

impl CqtKernel {
    /// Build the 84-bin filter bank for `sample_rate`.
    ///
    /// Each bin is a Hann-windowed complex exponential of length
    /// `Q * sr / f_k`, normalized to unit L1 norm, centered in a
    /// power-of-two FFT frame and transformed once.
    pub fn new(sample_rate: u32) -> Result<Self, TransformError> {
        let sr = sample_rate as f64;
        let bpo = BINS_PER_OCTAVE as f64;
        let alpha = (2f64.powf(2.0 / bpo) - 1.0) / (2f64.powf(2.0 / bpo) + 1.0);
        let q = 1.0 / alpha;

        let freqs: Vec<f64> = (0..N_CQT_BINS)
            .map(|k| CQT_FMIN * 2f64.powf(k as f64 / bpo))
            .collect();
        let f_max = freqs[N_CQT_BINS - 1];
        let cutoff = f_max * (1.0 + 0.5 * HANN_BANDWIDTH / q);
        if cutoff > sr / 2.0 {
            return Err(TransformError::NyquistExceeded {
                sample_rate,
                cutoff,
            });
        }

        let lengths: Vec<f64> = freqs.iter().map(|f| q * sr / f).collect();
        let max_len = lengths.iter().cloned().fold(0.0f64, f64::max);
        let n_fft = (max_len.ceil() as usize).next_power_of_two();
        let n_bins = n_fft / 2 + 1;

        let fft = FftPlanner::<f64>::new().plan_fft_forward(n_fft);
        let mut rows = Vec::with_capacity(N_CQT_BINS);
        for (&freq, &len) in freqs.iter().zip(&lengths) {
            let mut basis = wavelet(freq, len, sr, n_fft);
            fft.process(&mut basis);
            rows.push(sparsify(&basis[..n_bins], (1.0 / len.sqrt()) as f32));
        }

        Ok(Self { n_fft, rows })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Constant-Q magnitude of `y`, `84 × frames`.
    pub fn magnitude(&self, y: &[f32], hop: usize) -> Array2<f32> {
        let padded = pad_constant(y, self.n_fft / 2);
        let n_frames = frame_count(padded.len(), self.n_fft, hop);

        let mut fft = FrameFft::new(self.n_fft);
        let mut out = Array2::<f32>::zeros((self.rows.len(), n_frames));
        for t in 0..n_frames {
            let start = t * hop;
            let spectrum = fft.process(&padded[start..start + self.n_fft], None);
            for (k, row) in self.rows.iter().enumerate() {
                let response: Complex<f32> = row
                    .weights
                    .iter()
                    .zip(&spectrum[row.start..row.start + row.weights.len()])
                    .map(|(w, x)| w * x)
                    .sum();
                out[[k, t]] = response.norm() * row.scale;
            }
        }
        out
    }
}

/// Time-domain filter for one constant-Q bin, centered in an `n_fft` frame
/// and pre-scaled by `len / n_fft`.
fn wavelet(freq: f64, len: f64, sr: f64, n_fft: usize) -> Vec<Complex<f64>> {
    let first = (-len / 2.0).floor() as i64;
    let last = (len / 2.0).floor() as i64;
    let count = (last - first) as usize;

    // Window of floor(len) samples, zero-extended to the filter length
    let mut window = hann_periodic(len.floor() as usize);
    window.resize(count, 0.0);
    let l1: f64 = window.iter().sum();

    let gain = len / n_fft as f64 / l1;
    let offset = (n_fft - count) / 2;
    let mut basis = vec![Complex::new(0.0, 0.0); n_fft];
    for (i, w) in window.iter().enumerate() {
        let t = (first + i as i64) as f64;
        let phase = 2.0 * PI * freq * t / sr;
        basis[offset + i] = Complex::from_polar(w * gain, phase);
    }
    basis
}

/// Drop the smallest-magnitude bins holding `KERNEL_SPARSITY` of the row's
/// total magnitude, keeping the contiguous span of what remains.
fn sparsify(row: &[Complex<f64>], scale: f32) -> KernelRow {
    let mags: Vec<f64> = row.iter().map(|c| c.norm()).collect();
    let total: f64 = mags.iter().sum();

    let mut sorted = mags.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut cumulative = 0.0;
    let mut threshold = sorted.last().copied().unwrap_or(0.0);
    for &m in &sorted {
        cumulative += m / total;
        if cumulative >= KERNEL_SPARSITY {
            threshold = m;
            break;
        }
    }

    let first = mags.iter().position(|&m| m >= threshold).unwrap_or(0);
    let last = mags.iter().rposition(|&m| m >= threshold).unwrap_or(0);
    let weights = (first..=last)
        .map(|i| {
            if mags[i] >= threshold {
                Complex::new(row[i].re as f32, row[i].im as f32)
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect();

    KernelRow {
        start: first,
        weights,
        scale,
    }
}

/// Constant-Q magnitude of `y` with 84 bins from C1, 12 bins per octave.
pub fn cqt_magnitude(y: &[f32], sample_rate: u32, hop: usize) -> Result<Array2<f32>, TransformError> {
    let kernel = CqtKernel::new(sample_rate)?;
    Ok(kernel.magnitude(y, hop))
}
