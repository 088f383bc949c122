use crate::spectrogram::Spectrogram;

/// The loudest cell of one block. `freq`/`time` are in Hz and seconds,
/// `freq_bin`/`time_bin` are the grid coordinates they came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub freq: f64,
    pub time: f64,
    pub freq_bin: usize,
    pub time_bin: usize,
}

/// One peak per `block_size` x `block_size` block. Blocks are swept time-major
/// (outer loop over time blocks, inner over frequency blocks) and the output keeps
/// that order; hashing pairs neighbours in this sequence, not in time order.
///
/// Inside a block cells are scanned frequency-major and the first cell holding the
/// maximum wins. A block made only of silent cells yields no peak.
pub fn extract_peaks(spectrogram: &Spectrogram, block_size: usize) -> Vec<Peak> {
    if spectrogram.is_empty() || block_size == 0 {
        return Vec::new();
    }

    let num_times = spectrogram.times.len();
    let num_freqs = spectrogram.freqs.len();
    let mut peaks =
        Vec::with_capacity(num_times.div_ceil(block_size) * num_freqs.div_ceil(block_size));

    for time_start in (0..num_times).step_by(block_size) {
        let time_end = (time_start + block_size).min(num_times);

        for freq_start in (0..num_freqs).step_by(block_size) {
            let freq_end = (freq_start + block_size).min(num_freqs);

            let all_silent = (freq_start..freq_end).all(|freq_bin| {
                (time_start..time_end).all(|time_bin| spectrogram.is_silent(freq_bin, time_bin))
            });
            if all_silent {
                continue;
            }

            let mut best = (freq_start, time_start);
            let mut best_value = spectrogram.get(freq_start, time_start);

            for freq_bin in freq_start..freq_end {
                for time_bin in time_start..time_end {
                    let value = spectrogram.get(freq_bin, time_bin);
                    if value > best_value {
                        best_value = value;
                        best = (freq_bin, time_bin);
                    }
                }
            }

            let (freq_bin, time_bin) = best;
            peaks.push(Peak {
                freq: spectrogram.freqs[freq_bin],
                time: spectrogram.times[time_bin],
                freq_bin,
                time_bin,
            });
        }
    }

    peaks
}
