//! Lazily expanding tree items and the browsing context.
//!
//! A [`Browser`] owns the pieces a live file tree needs: browse
//! configuration, the preloading cache, the directory watcher with its
//! tree-change notifier, the child comparator and the current filter,
//! with explicit construction and an explicit [`Browser::shutdown`].
//! [`TreeItem`]s wrap [`arbor_core::PathNode`]s and drive their lazy,
//! cancellable population.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use arbor_tree::Browser;
//! use std::path::Path;
//!
//! let browser = Browser::builder().build()?;
//! let home = browser.item(Path::new("/home"))?;
//! home.populate()?;
//! for child in home.children() {
//!     println!("{}", child.name());
//! }
//! browser.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod browser;
mod error;
mod item;
mod rescan;

pub use browser::{Browser, BrowserBuilder};
pub use error::{BrowseError, TreeError};
pub use item::TreeItem;

// Re-export the vocabulary consumers need alongside the tree
pub use arbor_cache::{LoadHandle, LoadOutcome, Preloader};
pub use arbor_core::{
    default_comparator, BrowseConfig, DriveInfo, DriveKind, ListError, LoadState, NodeAttrs,
    NodeComparator, NodeFilter, NodeKind, PathNode, Transport,
};
pub use arbor_fs::{DriveError, DriveRecord, DriveSource, LsblkSource};
pub use arbor_watch::{DirectoryWatcher, WatchEvent, WatchEventKind, WatchListener};
