//! Cache error types.
//!
//! None of these reach callers of [`ScanCache`](crate::ScanCache): they are
//! logged and turned into a miss or a skipped write.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing cache files.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected schema.
    #[error("Malformed cache file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file was written by an incompatible version.
    #[error("Unsupported cache format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    /// The payload parsed but does not describe a consistent tree.
    #[error("Invalid snapshot: {message}")]
    Invalid { message: String },
}

impl CacheError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error with path context.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Returns `true` if the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
