use std::path::Path;

use hound::SampleFormat;
use tracing::{debug, warn};

use crate::config::{REQUIRED_CHANNELS, SAMPLE_RATE};
use crate::error::{Error, Result};

/// Two decoded channels of one recording. Integer PCM keeps its raw integer scale.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoAudio {
    pub sample_rate: u32,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl StereoAudio {
    pub fn new(sample_rate: u32, left: Vec<f64>, right: Vec<f64>) -> Self {
        Self {
            sample_rate,
            left,
            right,
        }
    }

    pub fn channels(&self) -> [&[f64]; 2] {
        [&self.left, &self.right]
    }

    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

pub fn load_stereo_wav(filepath: impl AsRef<Path>) -> Result<StereoAudio> {
    let filepath = filepath.as_ref();
    let mut reader = hound::WavReader::open(filepath)?;
    let spec = reader.spec();

    debug!(
        path = %filepath.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        format = ?spec.sample_format,
        samples = reader.len(),
        "wav header"
    );

    if spec.channels != REQUIRED_CHANNELS {
        return Err(Error::UnsupportedChannels {
            path: filepath.to_path_buf(),
            channels: spec.channels,
        });
    }

    if spec.sample_rate != SAMPLE_RATE {
        warn!(
            path = %filepath.display(),
            found = spec.sample_rate,
            expected = SAMPLE_RATE,
            "sample rate differs from the analysis rate, fingerprints will not line up"
        );
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
    };

    let (left, right) = interleaved
        .chunks_exact(2)
        .map(|frame| (frame[0], frame[1]))
        .unzip();

    Ok(StereoAudio::new(spec.sample_rate, left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_is_deinterleaved_at_raw_scale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[100, -100, 2000, -2000, i16::MAX, i16::MIN]);

        let audio = load_stereo_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, SAMPLE_RATE);
        assert_eq!(audio.left, vec![100.0, 2000.0, i16::MAX as f64]);
        assert_eq!(audio.right, vec![-100.0, -2000.0, i16::MIN as f64]);
        assert_eq!(audio.frames(), 3);
        let [left, right] = audio.channels();
        assert_eq!(left[1], 2000.0);
        assert_eq!(right[1], -2000.0);
    }

    #[test]
    fn mono_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &[1, 2, 3, 4]);

        match load_stereo_wav(&path) {
            Err(Error::UnsupportedChannels { channels, .. }) => assert_eq!(channels, 1),
            other => panic!("expected UnsupportedChannels, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_a_wav_error() {
        let dir = tempdir().unwrap();
        let err = load_stereo_wav(dir.path().join("nope.wav")).unwrap_err();
        assert!(matches!(err, Error::Wav(_)));
    }
}
