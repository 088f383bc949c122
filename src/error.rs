use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV decoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{}: expected 2 channels, found {channels}", path.display())]
    UnsupportedChannels { path: PathBuf, channels: u16 },

    #[error("invalid analysis parameters: {0}")]
    InvalidParams(String),

    #[error("analysis parameters differ: index has [{stored}], this build uses [{expected}]")]
    ParamsMismatch { stored: String, expected: String },

    #[error("index file not found: {0}")]
    IndexNotFound(PathBuf),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("no .wav files found in {0}")]
    EmptyLibrary(PathBuf),

    #[error("match deadline exceeded")]
    DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, Error>;
