use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::config::AnalysisParams;
use crate::error::{Error, Result};

/// Energy grid in dB. `bins[time][freq]`, with `freqs` in Hz and `times` in seconds.
/// `silent` has the same shape and marks cells whose power was zero or not finite;
/// those cells read as 0 dB in `bins`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub freqs: Vec<f64>,
    pub times: Vec<f64>,
    pub bins: Vec<Vec<f64>>,
    pub silent: Vec<Vec<bool>>,
}

impl Spectrogram {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty() || self.freqs.is_empty()
    }

    pub fn get(&self, freq_bin: usize, time_bin: usize) -> f64 {
        self.bins[time_bin][freq_bin]
    }

    pub fn is_silent(&self, freq_bin: usize, time_bin: usize) -> bool {
        self.silent[time_bin][freq_bin]
    }
}

pub fn hann_window(window_size: usize) -> Vec<f64> {
    if window_size == 1 {
        return vec![1.0];
    }
    (0..window_size)
        .map(|n| {
            // 0.5 - 0.5 * cos(2 * pi * n / (N - 1))
            let value = 2.0 * PI * (n as f64) / (window_size as f64 - 1.0);
            0.5 - 0.5 * value.cos()
        })
        .collect()
}

/// Short-time power spectrum of one channel. Holds only the FFT plan and window,
/// so a single analyzer can be shared across threads.
#[derive(Clone)]
pub struct SpectrogramAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    window_coefficients: Vec<f64>,
    window_power: f64,
    window_size: usize,
    hop_size: usize,
    sample_rate: u32,
}

impl SpectrogramAnalyzer {
    pub fn new(params: &AnalysisParams) -> Result<Self> {
        if !params.window_size.is_power_of_two() || params.window_size < 2 {
            return Err(Error::InvalidParams(format!(
                "window size {} is not a power of two",
                params.window_size
            )));
        }
        if params.hop_size == 0 || params.hop_size > params.window_size {
            return Err(Error::InvalidParams(format!(
                "hop size {} must be within 1..={}",
                params.hop_size, params.window_size
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(params.window_size);
        let window_coefficients = hann_window(params.window_size);
        let window_power = window_coefficients.iter().map(|w| w * w).sum();

        Ok(Self {
            fft,
            window_coefficients,
            window_power,
            window_size: params.window_size,
            hop_size: params.hop_size,
            sample_rate: params.sample_rate,
        })
    }

    pub fn analyze(&self, samples: &[f64]) -> Spectrogram {
        let num_freq_bins = self.window_size / 2 + 1;
        let rate = self.sample_rate as f64;

        if samples.is_empty() {
            return Spectrogram {
                freqs: Vec::new(),
                times: Vec::new(),
                bins: Vec::new(),
                silent: Vec::new(),
            };
        }

        let padded;
        let samples = if samples.len() < self.window_size {
            let mut buffer = samples.to_vec();
            buffer.resize(self.window_size, 0.0);
            padded = buffer;
            &padded[..]
        } else {
            samples
        };

        let freqs = (0..num_freq_bins)
            .map(|k| k as f64 * rate / self.window_size as f64)
            .collect();

        let mut times = Vec::new();
        let mut bins = Vec::new();
        let mut silent = Vec::new();
        let mut complex_buffer = vec![Complex::new(0.0, 0.0); self.window_size];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];

        for (frame, audio_chunk) in samples
            .windows(self.window_size)
            .step_by(self.hop_size)
            .enumerate()
        {
            for (slot, (sample, coeff)) in complex_buffer
                .iter_mut()
                .zip(audio_chunk.iter().zip(self.window_coefficients.iter()))
            {
                *slot = Complex::new(sample * coeff, 0.0);
            }

            self.fft.process_with_scratch(&mut complex_buffer, &mut scratch);

            let (magnitudes, mask): (Vec<f64>, Vec<bool>) = complex_buffer[..num_freq_bins]
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    let mut power = c.norm_sqr();
                    // one-sided density: everything except DC and Nyquist carries both halves
                    if k != 0 && k != num_freq_bins - 1 {
                        power *= 2.0;
                    }
                    power /= rate * self.window_power;
                    let db = 10.0 * power.log10();
                    if db.is_finite() { (db, false) } else { (0.0, true) }
                })
                .unzip();

            let centre = (self.window_size / 2 + frame * self.hop_size) as f64;
            times.push(centre / rate);
            bins.push(magnitudes);
            silent.push(mask);
        }

        Spectrogram {
            freqs,
            times,
            bins,
            silent,
        }
    }
}
