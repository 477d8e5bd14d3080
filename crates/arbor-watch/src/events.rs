//! Typed watch events and the listener surface.

use std::path::{Path, PathBuf};

use strum::Display;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEventKind {
    /// An entry was created.
    Created,
    /// An entry was modified.
    Modified,
    /// An entry was deleted.
    Deleted,
    /// The OS dropped events; consumers should rescan.
    Overflow,
}

/// One change under a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// The affected entry.
    pub path: PathBuf,
    /// The registered directory the event belongs to.
    pub dir: PathBuf,
}

/// Receiver of watch notifications.
///
/// Events are delivered synchronously on the watch loop thread, in
/// listener-registration order. Implementations must not block.
pub trait WatchListener: Send + Sync {
    /// A change under a watched directory.
    fn on_event(&self, event: &WatchEvent);

    /// A directory's native watch could not be re-armed and its
    /// registration was dropped.
    fn on_reset_failed(&self, _dir: &Path) {}

    /// The registry became empty after a failed re-arm; the watch
    /// loop terminates.
    fn on_watch_list_empty(&self) {}

    /// An event arrived for a path no registered directory covers.
    fn on_unknown_source(&self, _path: &Path) {}
}
