//! Error types for directory enumeration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while enumerating a directory's children.
///
/// Enumeration errors are recovered locally: they are recorded on the
/// affected node and surface as `LOADED_WITH_ERROR`, never thrown to
/// the caller of child access.
#[derive(Debug, Error)]
pub enum ListError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path is not a directory and has no children to list.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The listing was cancelled cooperatively.
    #[error("Listing interrupted")]
    Interrupted,
}

impl ListError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error is a cooperative cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
