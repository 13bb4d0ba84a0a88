use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),
    #[error("No audio samples in {0}")]
    Empty(String),
    #[error("Non-finite sample values in {0}")]
    NonFinite(String),
}

/// Mono samples at the file's native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load an audio file as a mono waveform, without resampling.
///
/// WAV goes through hound, FLAC through claxon. Channels are averaged.
pub fn load_audio(path: &Path) -> Result<Waveform, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let waveform = match ext.as_str() {
        "wav" | "wave" => load_wav(path)?,
        "flac" => load_flac(path)?,
        _ => return Err(DecodeError::UnsupportedFormat(ext)),
    };

    if waveform.is_empty() || waveform.sample_rate == 0 {
        return Err(DecodeError::Empty(path.display().to_string()));
    }
    Ok(waveform)
}

/// Full-scale factor for signed integer samples of the given bit depth.
fn int_scale(bits: u32) -> f32 {
    1.0 / (1u64 << (bits.clamp(1, 32) - 1)) as f32
}

fn load_wav(path: &Path) -> Result<Waveform, DecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples: Vec<f32> = reader.samples::<f32>().collect::<Result<_, _>>()?;
            if samples.iter().any(|s| !s.is_finite()) {
                return Err(DecodeError::NonFinite(path.display().to_string()));
            }
            samples
        }
        hound::SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample as u32);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Waveform::new(
        downmix(interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

fn load_flac(path: &Path) -> Result<Waveform, DecodeError> {
    let mut reader = claxon::FlacReader::open(path)?;
    let info = reader.streaminfo();
    let scale = int_scale(info.bits_per_sample);

    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 * scale))
        .collect::<Result<_, _>>()?;

    Ok(Waveform::new(
        downmix(interleaved, info.channels as usize),
        info.sample_rate,
    ))
}

/// Average interleaved channels into one.
fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved,
        n => interleaved
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_mono_wav_at_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1, &[0, 16384, -16384, 32767]);

        let w = load_audio(&path).unwrap();
        assert_eq!(w.sample_rate, 16000);
        assert_eq!(w.samples, vec![0.0, 0.5, -0.5, 32767.0 / 32768.0]);
    }

    #[test]
    fn stereo_is_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.WAV");
        write_wav(&path, 2, &[16384, 0, -16384, -16384]);

        let w = load_audio(&path).unwrap();
        assert_eq!(w.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.write_sample(-1.0f32).unwrap();
        writer.finalize().unwrap();

        let w = load_audio(&path).unwrap();
        assert_eq!(w.sample_rate, 44100);
        assert_eq!(w.samples, vec![0.25, -1.0]);
    }

    #[test]
    fn float_wav_with_nan_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.write_sample(f32::NAN).unwrap();
        writer.write_sample(f32::INFINITY).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(load_audio(&path), Err(DecodeError::NonFinite(_))));
    }

    /// Stereo, 16-bit, 16 kHz, one verbatim frame of 16 samples.
    /// Left ramps from -16384 in steps of 2048, right holds 16384.
    const STEREO_FLAC: [u8; 117] = [
        0x66, 0x4c, 0x61, 0x43, 0x80, 0x00, 0x00, 0x22, 0x00, 0x10, 0x00, 0x10,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xe8, 0x02, 0xf0, 0x00, 0x00,
        0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xf8, 0x65, 0x18, 0x00, 0x0f,
        0x7a, 0x02, 0xc0, 0x00, 0xc8, 0x00, 0xd0, 0x00, 0xd8, 0x00, 0xe0, 0x00,
        0xe8, 0x00, 0xf0, 0x00, 0xf8, 0x00, 0x00, 0x00, 0x08, 0x00, 0x10, 0x00,
        0x18, 0x00, 0x20, 0x00, 0x28, 0x00, 0x30, 0x00, 0x38, 0x00, 0x02, 0x40,
        0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40,
        0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40,
        0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x00, 0xa1, 0x8a,
    ];

    #[test]
    fn loads_stereo_flac_at_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.flac");
        std::fs::write(&path, STEREO_FLAC).unwrap();

        let w = load_audio(&path).unwrap();
        assert_eq!(w.sample_rate, 16000);
        // ((2048 i - 16384) + 16384) / 2 / 32768 = i / 32
        let expected: Vec<f32> = (0..16).map(|i| i as f32 / 32.0).collect();
        assert_eq!(w.samples, expected);
    }

    #[test]
    fn text_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "this is not audio").unwrap();

        assert!(matches!(load_audio(&path), Err(DecodeError::Wav(_))));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 1, &[]);
        assert!(matches!(load_audio(&path), Err(DecodeError::Empty(_))));
    }

    #[test]
    fn unknown_extension() {
        let err = load_audio(Path::new("/tmp/song.xyz")).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(ref e) if e == "xyz"));
    }

    #[test]
    fn missing_file() {
        let err = load_audio(Path::new("/nonexistent/dir/missing.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Wav(_)));
    }

    #[test]
    fn corrupt_flac() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.flac");
        std::fs::write(&path, b"fLaC but not really").unwrap();
        assert!(matches!(load_audio(&path), Err(DecodeError::Flac(_))));
    }
}
