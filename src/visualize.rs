use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::info;

use crate::error::Result;
use crate::peaks::Peak;
use crate::spectrogram::Spectrogram;

const PEAK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Grey-scale dB grid, one pixel per cell, low frequencies at the bottom.
/// Peaks are drawn on top in red.
pub fn spectrogram_image(spectrogram: &Spectrogram, peaks: &[Peak]) -> RgbImage {
    if spectrogram.is_empty() {
        return RgbImage::new(0, 0);
    }

    let width = spectrogram.times.len();
    let height = spectrogram.freqs.len();

    let (min_db, max_db) = spectrogram
        .bins
        .iter()
        .flatten()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &db| (lo.min(db), hi.max(db)));
    let db_range = max_db - min_db;
    let db_range = if db_range < 1e-6 { 1.0 } else { db_range };

    let mut imgbuf = RgbImage::new(width as u32, height as u32);

    for (t, time_slice) in spectrogram.bins.iter().enumerate() {
        for (f, &db) in time_slice.iter().enumerate() {
            let scaled_val = (db - min_db) / db_range;
            let intensity = (scaled_val.clamp(0.0, 1.0) * 255.0).round() as u8;
            let x = t as u32;
            let y = (height - 1 - f) as u32;
            imgbuf.put_pixel(x, y, Rgb([intensity, intensity, intensity]));
        }
    }

    for peak in peaks {
        if peak.time_bin < width && peak.freq_bin < height {
            let x = peak.time_bin as u32;
            let y = (height - 1 - peak.freq_bin) as u32;
            imgbuf.put_pixel(x, y, PEAK_COLOR);
        }
    }

    imgbuf
}

pub fn render_spectrogram(
    spectrogram: &Spectrogram,
    peaks: &[Peak],
    output_path: impl AsRef<Path>,
) -> Result<()> {
    let output_path = output_path.as_ref();
    spectrogram_image(spectrogram, peaks).save(output_path)?;
    info!(path = %output_path.display(), peaks = peaks.len(), "spectrogram with peaks saved");
    Ok(())
}
