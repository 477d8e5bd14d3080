//! Filesystem watching for arbor.
//!
//! A [`DirectoryWatcher`] holds one non-recursive native watch per
//! registered directory and fans typed [`WatchEvent`]s out to
//! listeners from a single dedicated loop thread. The
//! [`TreeChangeNotifier`] bridges create events back into the tree by
//! asking the observing item to recompute its children.

mod events;
mod notifier;
mod watcher;

pub use events::{WatchEvent, WatchEventKind, WatchListener};
pub use notifier::{Reloadable, TreeChangeNotifier};
pub use watcher::{DirectoryWatcher, WatchError};
