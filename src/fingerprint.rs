use crate::audio::StereoAudio;
use crate::config::AnalysisParams;
use crate::error::Result;
use crate::hashing::{FingerprintRecord, hash_peaks};
use crate::peaks::{Peak, extract_peaks};
use crate::spectrogram::{Spectrogram, SpectrogramAnalyzer};

/// Analyzer, peak extractor and hasher behind one set of parameters. Reference
/// tracks and queries both go through here.
#[derive(Clone)]
pub struct Fingerprinter {
    params: AnalysisParams,
    analyzer: SpectrogramAnalyzer,
}

impl Fingerprinter {
    pub fn new(params: AnalysisParams) -> Result<Self> {
        let analyzer = SpectrogramAnalyzer::new(&params)?;
        Ok(Self { params, analyzer })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn spectrogram(&self, channel: &[f64]) -> Spectrogram {
        self.analyzer.analyze(channel)
    }

    pub fn peaks(&self, channel: &[f64]) -> Vec<Peak> {
        extract_peaks(&self.spectrogram(channel), self.params.peak_block_size)
    }

    pub fn fingerprint_channel(&self, channel: &[f64]) -> Vec<FingerprintRecord> {
        hash_peaks(&self.peaks(channel), &self.params)
    }

    /// Left channel records followed by right channel records.
    pub fn fingerprint_audio(&self, audio: &StereoAudio) -> Vec<FingerprintRecord> {
        let [left, right] = audio.channels();
        let (mut left, right) = rayon::join(
            || self.fingerprint_channel(left),
            || self.fingerprint_channel(right),
        );
        left.extend(right);
        left
    }
}


#[cfg(test)]
mod tests {
    use super::test_signals::melody;
    use super::*;

    #[test]
    fn peaks_are_reproducible() {
        let fingerprinter = Fingerprinter::new(AnalysisParams::default()).unwrap();
        let audio = melody(7, 3.0);
        let first = fingerprinter.peaks(&audio.left);
        let second = fingerprinter.peaks(&audio.left);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn stereo_records_are_left_then_right() {
        let fingerprinter = Fingerprinter::new(AnalysisParams::default()).unwrap();
        let audio = melody(11, 2.0);
        let left = fingerprinter.fingerprint_channel(&audio.left);
        let right = fingerprinter.fingerprint_channel(&audio.right);
        let both = fingerprinter.fingerprint_audio(&audio);

        assert_eq!(both.len(), left.len() + right.len());
        assert_eq!(&both[..left.len()], &left[..]);
        assert_eq!(&both[left.len()..], &right[..]);
    }
}
