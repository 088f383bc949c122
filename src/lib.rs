//! Stereo audio fingerprinting: spectrogram peaks are paired into hashes, indexed
//! per reference track, and a query clip is resolved by voting on the time offset
//! its hashes agree on.

pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod index;
pub mod library;
pub mod logging;
pub mod matching;
pub mod peaks;
pub mod spectrogram;
pub mod visualize;

pub use audio::{StereoAudio, load_stereo_wav};
pub use config::AnalysisParams;
pub use error::{Error, Result};
pub use fingerprint::Fingerprinter;
pub use hashing::FingerprintRecord;
pub use index::{FingerprintIndex, IndexBuilder, IndexEntry, TrackId};
pub use matching::{DuplicateHashPolicy, MatchOptions, MatchResult, Matcher};
