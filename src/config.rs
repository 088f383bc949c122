// Analysis Parameters
pub const SAMPLE_RATE: u32 = 44100;
pub const WINDOW_SIZE: usize = 4096;
pub const WINDOW_OVERLAP: f64 = 0.5;
pub const REQUIRED_CHANNELS: u16 = 2;

// Peak Finding Parameters
pub const PEAK_BLOCK_SIZE: usize = 30;

// Hashing Parameters
pub const HASH_TARGET_ZONE: usize = 8;
pub const HASH_SEED: u64 = 0x7065_616b_7072_6e74;

// Library Parameters
pub const TRACK_NAME_PREFIX_LEN: usize = 4;

/// Everything that shapes the hash space. Build and query must agree on all of it,
/// so it is stored alongside a persisted index and checked on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub sample_rate: u32,
    pub window_size: usize,
    pub hop_size: usize,
    pub peak_block_size: usize,
    pub target_zone: usize,
}

impl AnalysisParams {
    /// Seconds between two consecutive spectrogram frames.
    pub fn frame_duration(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    pub fn encode(&self) -> String {
        format!(
            "rate={};window={};hop={};block={};zone={}",
            self.sample_rate,
            self.window_size,
            self.hop_size,
            self.peak_block_size,
            self.target_zone
        )
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        let overlap = (WINDOW_SIZE as f64 * WINDOW_OVERLAP) as usize;
        Self {
            sample_rate: SAMPLE_RATE,
            window_size: WINDOW_SIZE,
            hop_size: WINDOW_SIZE - overlap,
            peak_block_size: PEAK_BLOCK_SIZE,
            target_zone: HASH_TARGET_ZONE,
        }
    }
}

impl std::fmt::Display for AnalysisParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
