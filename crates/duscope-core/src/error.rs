//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading a single entry.
///
/// These never abort a scan; the scanner and lister turn them into
/// [`ScanWarning`]s and carry on.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found (or vanished during the scan).
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Path the error refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::PermissionDenied { path } | Self::NotFound { path } | Self::Io { path, .. } => {
                path
            }
        }
    }

    /// Warning kind matching this error, for a directory listing or an entry stat.
    pub fn warning_kind(&self, listing: bool) -> WarningKind {
        match self {
            Self::PermissionDenied { .. } => WarningKind::PermissionDenied,
            Self::NotFound { .. } => WarningKind::Vanished,
            Self::Io { .. } if listing => WarningKind::ReadError,
            Self::Io { .. } => WarningKind::MetadataError,
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Entry disappeared between listing and stat.
    Vanished,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered during a scan or listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Warning for a directory that could not be listed.
    pub fn listing(error: &ScanError) -> Self {
        Self::new(error.path().clone(), error.to_string(), error.warning_kind(true))
    }

    /// Warning for an entry whose metadata could not be read.
    pub fn entry(error: &ScanError) -> Self {
        Self::new(error.path().clone(), error.to_string(), error.warning_kind(false))
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));

        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.warning_kind(false), WarningKind::Vanished);
    }

    #[test]
    fn test_warning_from_listing_error() {
        let err = ScanError::io("/x", std::io::Error::other("boom"));
        let warning = ScanWarning::listing(&err);
        assert_eq!(warning.kind, WarningKind::ReadError);
        assert_eq!(warning.path, PathBuf::from("/x"));
        assert!(warning.message.contains("boom"));
    }

    #[test]
    fn test_scan_warning_creation() {
        let warning = ScanWarning::permission_denied("/test/path");
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("Permission denied"));
    }
}
