use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

use crate::audio::load_stereo_wav;
use crate::config::{AnalysisParams, TRACK_NAME_PREFIX_LEN};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprinter;
use crate::hashing::FingerprintRecord;
use crate::index::{FingerprintIndex, IndexBuilder};

/// `"01. Some Song.wav"` -> `"Some_Song"`: drops the track-number prefix and the
/// extension, and replaces spaces with underscores.
pub fn track_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name: String = stem.chars().skip(TRACK_NAME_PREFIX_LEN).collect();
    if name.is_empty() {
        return None;
    }
    Some(name.replace(' ', "_"))
}

/// Track id for `path`, or its bare file stem when there is no name after the
/// prefix. Never includes the directory.
fn track_id_or_stem(path: &Path) -> String {
    track_id_from_path(path).unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().replace(' ', "_"))
            .unwrap_or_default()
    })
}

/// `.wav` files directly inside `dir`, sorted by path.
pub fn scan_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if path.is_file() && is_wav {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Decodes and fingerprints every file on the rayon pool. Each worker returns its
/// own batch; the first failure aborts the whole run.
pub fn fingerprint_tracks(
    paths: &[PathBuf],
    fingerprinter: &Fingerprinter,
) -> Result<Vec<(String, Vec<FingerprintRecord>)>> {
    let total = paths.len();
    paths
        .par_iter()
        .enumerate()
        .map(|(i, path)| -> Result<(String, Vec<FingerprintRecord>)> {
            let track = track_id_or_stem(path);
            let audio = load_stereo_wav(path)?;
            let records = fingerprinter.fingerprint_audio(&audio);
            info!(
                track = %track,
                seconds = audio.duration_secs(),
                hashes = records.len(),
                "processing: ({}/{})",
                i + 1,
                total
            );
            Ok((track, records))
        })
        .collect()
}

/// Merges worker batches in track order so the resulting buckets do not depend on
/// scheduling.
pub fn merge_batches(
    params: AnalysisParams,
    mut batches: Vec<(String, Vec<FingerprintRecord>)>,
) -> FingerprintIndex {
    batches.sort_by(|a, b| a.0.cmp(&b.0));
    let mut builder = IndexBuilder::new(params);
    for (track, records) in &batches {
        builder.add_records(track, records);
    }
    builder.finish()
}

pub fn build_index(dir: &Path, params: AnalysisParams) -> Result<FingerprintIndex> {
    let paths = scan_wav_files(dir)?;
    if paths.is_empty() {
        return Err(Error::EmptyLibrary(dir.to_path_buf()));
    }
    info!(dir = %dir.display(), files = paths.len(), "building database");

    let fingerprinter = Fingerprinter::new(params)?;
    let batches = fingerprint_tracks(&paths, &fingerprinter)?;
    Ok(merge_batches(params, batches))
}
