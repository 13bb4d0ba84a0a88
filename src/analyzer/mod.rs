pub mod chroma;
pub mod decode;
pub mod mel;
pub mod spectral;
pub mod transform;
pub mod util;

use crate::schema::{FeatureRecord, FeatureSet};
use decode::Waveform;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// FFT size of the STFT and frame length of the zero-crossing rate.
pub const N_FFT: usize = 2048;
/// Hop between successive frames for every transform.
pub const HOP_LENGTH: usize = 512;
/// Frequency axis assumed by descriptors computed from a spectrogram alone
/// (chroma-STFT, centroid, bandwidth, contrast, rolloff). The mel filter bank
/// uses the file's own rate instead.
pub const REFERENCE_SAMPLE_RATE: u32 = 22050;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Transform error: {0}")]
    Transform(#[from] transform::TransformError),
    #[error(
        "{transform} shape {bins}x{frames} outside expected {expected_bins} bins and {min_frames}..={max_frames} frames"
    )]
    InvariantViolation {
        transform: &'static str,
        bins: usize,
        frames: usize,
        expected_bins: usize,
        min_frames: usize,
        max_frames: usize,
    },
    #[error("{feature} has {count} non-finite values")]
    NonFinite { feature: &'static str, count: usize },
}

/// Check a transform against the expected bin count and the frame bound
/// `ceil(len / hop) ..= ceil(len / hop) + 1`.
fn check_shape(
    transform: &'static str,
    array: &Array2<f32>,
    expected_bins: usize,
    len: usize,
) -> Result<(), ExtractError> {
    let (bins, frames) = array.dim();
    let min_frames = len.div_ceil(HOP_LENGTH);
    let max_frames = min_frames + 1;
    if bins != expected_bins || frames < min_frames || frames > max_frames {
        return Err(ExtractError::InvariantViolation {
            transform,
            bins,
            frames,
            expected_bins,
            min_frames,
            max_frames,
        });
    }
    Ok(())
}

/// Decode `path` and extract the full feature record, keyed by `identifier`.
pub fn extract(identifier: &str, path: &Path) -> Result<FeatureRecord, ExtractError> {
    log::debug!("Extracting: {}", path.display());
    let waveform = decode::load_audio(path)?;
    log::trace!(
        "{}: {} samples at {} Hz ({:.2}s)",
        identifier,
        waveform.len(),
        waveform.sample_rate,
        waveform.duration_secs()
    );
    extract_waveform(identifier, waveform)
}

/// Run the feature pipeline on an already-decoded waveform.
///
/// The waveform and intermediate transforms are dropped as soon as nothing
/// downstream needs them, which keeps peak memory near one transform's size.
pub fn extract_waveform(identifier: &str, waveform: Waveform) -> Result<FeatureRecord, ExtractError> {
    let len = waveform.len();
    let sample_rate = waveform.sample_rate;

    let zcr = spectral::zero_crossing_rate(&waveform.samples, N_FFT, HOP_LENGTH);

    let cqt = transform::cqt_magnitude(&waveform.samples, sample_rate, HOP_LENGTH)?;
    check_shape("CQT", &cqt, transform::N_CQT_BINS, len)?;
    let chroma_cqt = chroma::chroma_cqt(&cqt);
    let chroma_cens = chroma::chroma_cens(&cqt);
    // Tonnetz follows the smoothed CENS chroma, not the raw CQT chroma
    let tonnetz = chroma::tonnetz(&chroma_cens);
    drop(cqt);

    let stft = transform::stft_magnitude(&waveform.samples, N_FFT, HOP_LENGTH);
    check_shape("STFT", &stft, N_FFT / 2 + 1, len)?;
    drop(waveform);

    let power = stft.mapv(|m| m * m);
    let chroma_stft = chroma::chroma_stft(&power, REFERENCE_SAMPLE_RATE);

    let rmse = spectral::rms(&stft);
    let spectral_centroid = spectral::spectral_centroid(&stft, REFERENCE_SAMPLE_RATE);
    let spectral_bandwidth = spectral::spectral_bandwidth(&stft, REFERENCE_SAMPLE_RATE);
    let spectral_contrast = spectral::spectral_contrast(&stft, REFERENCE_SAMPLE_RATE);
    let spectral_rolloff = spectral::spectral_rolloff(&stft, REFERENCE_SAMPLE_RATE);

    let mel = mel::melspectrogram(&power, sample_rate);
    drop(power);
    drop(stft);

    let mfcc = mel::mfcc(&util::power_to_db(&mel), mel::N_MFCC);

    let features = FeatureSet {
        zcr,
        chroma_cqt,
        chroma_cens,
        tonnetz,
        chroma_stft,
        rmse,
        spectral_centroid,
        spectral_bandwidth,
        spectral_contrast,
        spectral_rolloff,
        mfcc,
    };
    check_finite(&features)?;

    Ok(FeatureRecord::new(identifier, features))
}

/// Reject a feature set holding NaN or infinite values, which have no
/// representation in the table cells.
fn check_finite(features: &FeatureSet) -> Result<(), ExtractError> {
    for (feature, array) in features.iter() {
        let count = array.iter().filter(|v| !v.is_finite()).count();
        if count > 0 {
            return Err(ExtractError::NonFinite {
                feature: feature.name(),
                count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Feature;

    fn sine(freq: f64, sr: u32, len: usize) -> Waveform {
        let samples = (0..len)
            .map(|i| {
                (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / sr as f64).sin()) as f32
            })
            .collect();
        Waveform::new(samples, sr)
    }

    fn chord(freqs: &[f64], sr: u32, len: usize) -> Waveform {
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / sr as f64;
                freqs
                    .iter()
                    .map(|f| 0.3 * (2.0 * std::f64::consts::PI * f * t).sin())
                    .sum::<f64>() as f32
            })
            .collect();
        Waveform::new(samples, sr)
    }

    #[test]
    fn record_has_fixed_row_counts() {
        let record = extract_waveform("tone", sine(440.0, 16000, 16000)).unwrap();
        assert_eq!(record.id, "tone");
        let frames = 16000usize.div_ceil(HOP_LENGTH);
        for feature in Feature::ALL {
            let array = record.features.get(feature);
            assert_eq!(array.nrows(), feature.rows(), "{}", feature.name());
            assert!(
                array.ncols() == frames || array.ncols() == frames + 1,
                "{}: {} frames",
                feature.name(),
                array.ncols()
            );
            assert!(array.iter().all(|v| v.is_finite()), "{} has non-finite values", feature.name());
        }
    }

    #[test]
    fn row_counts_do_not_depend_on_length() {
        for len in [700usize, 4096, 30000] {
            let record = extract_waveform("x", sine(220.0, 22050, len)).unwrap();
            assert_eq!(record.features.mfcc.nrows(), 20);
            assert_eq!(record.features.tonnetz.nrows(), 6);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let a = extract_waveform("a", sine(330.0, 22050, 11025)).unwrap();
        let b = extract_waveform("a", sine(330.0, 22050, 11025)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn silence_produces_a_record() {
        let record = extract_waveform("quiet", Waveform::new(vec![0.0; 4000], 16000)).unwrap();
        assert!(record.features.zcr.iter().all(|&v| v == 0.0));
        assert!(record.features.rmse.iter().all(|&v| v == 0.0));
        assert!(record.features.mfcc.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn tonnetz_follows_cens_chroma() {
        let record = extract_waveform("chord", chord(&[261.63, 329.63, 392.0], 22050, 22050)).unwrap();
        let f = &record.features;
        assert_eq!(chroma::tonnetz(&f.chroma_cens), f.tonnetz);
        assert_ne!(chroma::tonnetz(&f.chroma_cqt), f.tonnetz);
    }

    #[test]
    fn overflowing_signal_is_rejected() {
        // Finite samples whose power overflows f32
        let loud = Waveform::new(
            sine(440.0, 16000, 16000).samples.iter().map(|s| s * 2e20).collect(),
            16000,
        );
        let err = extract_waveform("loud", loud).unwrap_err();
        assert!(matches!(err, ExtractError::NonFinite { count, .. } if count > 0));
    }

    #[test]
    fn non_finite_check_names_the_feature() {
        let mut set = extract_waveform("tone", sine(440.0, 16000, 4000)).unwrap().features;
        assert!(check_finite(&set).is_ok());
        set.mfcc[[3, 0]] = f32::NAN;
        set.mfcc[[4, 1]] = f32::INFINITY;
        let err = check_finite(&set).unwrap_err();
        assert!(matches!(err, ExtractError::NonFinite { feature: "mfcc", count: 2 }));
    }

    #[test]
    fn low_sample_rate_fails_without_record() {
        let err = extract_waveform("lofi", sine(440.0, 8000, 8000)).unwrap_err();
        assert!(matches!(err, ExtractError::Transform(_)));
    }

    #[test]
    fn shape_check_bounds() {
        let ok = Array2::<f32>::zeros((1025, 3));
        assert!(check_shape("STFT", &ok, 1025, 1024).is_ok()); // ceil = 2
        assert!(check_shape("STFT", &ok, 1025, 1025).is_ok()); // ceil = 3
        let err = check_shape("STFT", &ok, 1025, 512).unwrap_err(); // ceil = 1
        assert!(matches!(
            err,
            ExtractError::InvariantViolation { frames: 3, min_frames: 1, max_frames: 2, .. }
        ));
        assert!(check_shape("CQT", &ok, 84, 1024).is_err());
    }

    #[test]
    fn extract_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, "plain text, renamed").unwrap();
        let err = extract("fake.wav", &path).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }
}
