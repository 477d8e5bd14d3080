//! Cache lookup errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from preloader lookups.
///
/// These are precondition violations on the caller's side, reported
/// immediately rather than retried.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key was never started.
    #[error("No preload entry for: {path}")]
    UnknownKey { path: PathBuf },
}
