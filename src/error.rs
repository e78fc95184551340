use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced while turning clips into images or splitting a corpus.
#[derive(Debug, Error)]
pub enum Error {
    /// The file could not be read or is not a decodable waveform.
    #[error("failed to decode '{}': {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to resample from {from} Hz to {to} Hz: {reason}")]
    Resample { from: u32, to: u32, reason: String },

    /// The frequency crop selects no bins.
    #[error("empty frequency window: bins [{min_bin}, {max_bin}) of {n_bins}")]
    InvalidRange {
        min_bin: i64,
        max_bin: i64,
        n_bins: usize,
    },

    #[error("filesystem error at '{}': {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write image '{}': {source}", .path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn decode(path: &Path, reason: impl ToString) -> Self {
        Error::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn fs(path: &Path, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }
}
