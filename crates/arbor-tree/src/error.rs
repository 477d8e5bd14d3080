//! Error types for the tree layer.

use std::path::PathBuf;

use thiserror::Error;

use arbor_watch::WatchError;

/// Programmer errors on tree items, reported immediately.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A second population was requested while one is in flight.
    #[error("Population already in flight for: {path}")]
    PopulationInFlight { path: PathBuf },
}

/// Errors from the browsing context.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The browser was built without a watcher.
    #[error("No watcher configured")]
    NoWatcher,

    /// Only directories can be watched.
    #[error("Not a watchable directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The path is already observed by another tree item.
    #[error("Path already observed: {path}")]
    AlreadyObserved { path: PathBuf },

    /// The native watcher refused the registration.
    #[error(transparent)]
    Watch(#[from] WatchError),
}
