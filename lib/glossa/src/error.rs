//! Error types for Glossa jobs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Glossa operations.
pub type Result<T> = std::result::Result<T, GlossaError>;

/// Fatal errors that abort a job.
#[derive(Error, Debug)]
pub enum GlossaError {
    /// Read, delete or write failure against the input or output location.
    #[error("storage error: {op} {}: {source}", path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A partition or fragment kept failing after every allowed attempt.
    #[error("partition {partition} failed after {attempts} attempts: {reason}")]
    Partition {
        partition: usize,
        attempts: usize,
        reason: String,
    },

    /// Invalid location or runtime option.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GlossaError {
    pub fn storage(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage { op, path: path.into(), source }
    }

    /// True when the error came from the storage layer rather than from retries running out.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Per-line tokenization failure. Never escapes the map stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("line is not valid UTF-8 (first bad byte at offset {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("tokenizer rejected line: {0}")]
    Rejected(String),
}

impl From<std::str::Utf8Error> for TokenizeError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8 { valid_up_to: e.valid_up_to() }
    }
}
