use tracing::debug;
use twox_hash::XxHash64;

use crate::config::{AnalysisParams, HASH_SEED};
use crate::peaks::Peak;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintRecord {
    pub hash: u64,
    /// Time of the anchor peak, in seconds.
    pub offset: f64,
}

/// Pairs every peak with the next `target_zone - 1` peaks of the sequence.
pub fn hash_peaks(peaks: &[Peak], params: &AnalysisParams) -> Vec<FingerprintRecord> {
    let frame_duration = params.frame_duration();
    let fan_out = params.target_zone.saturating_sub(1);
    let mut hashes = Vec::with_capacity(peaks.len() * fan_out);

    for (i, anchor) in peaks.iter().enumerate() {
        for target in peaks[i + 1..].iter().take(fan_out) {
            // delta from the frame distance, so equal shapes encode equally at any position
            let frames = target.time_bin as f64 - anchor.time_bin as f64;
            let time_delta = frames * frame_duration;

            hashes.push(FingerprintRecord {
                hash: hash_triple(anchor.freq, target.freq, time_delta),
                offset: anchor.time,
            });
        }
    }

    debug!(peaks = peaks.len(), hashes = hashes.len(), "hashed peak pairs");
    hashes
}

pub fn hash_triple(anchor_freq: f64, target_freq: f64, time_delta: f64) -> u64 {
    let encoded = format!("{}|{}|{}", anchor_freq, target_freq, time_delta);
    XxHash64::oneshot(HASH_SEED, encoded.as_bytes())
}
