//! Bridge from watch events to tree recomputation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::events::{WatchEvent, WatchEventKind, WatchListener};

/// Something observing one tree position that can recompute its
/// children on demand.
pub trait Reloadable: Send + Sync {
    /// The path this target observes.
    fn observed_path(&self) -> PathBuf;

    /// Discard the current children and repopulate.
    fn request_refresh(&self);
}

/// Maps watched paths to the tree items observing them.
///
/// On a create event whose parent is a known observed path, the
/// observing item recomputes its children: a targeted refresh rather
/// than a full cache invalidation. One watch maps to one authoritative
/// tree position: registering a second observer for the same path is
/// rejected.
#[derive(Default)]
pub struct TreeChangeNotifier {
    observed: DashMap<PathBuf, Arc<dyn Reloadable>>,
}

impl TreeChangeNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a path with the given target. Returns `false` (and
    /// logs) when the path is already observed by another target.
    pub fn observe(&self, target: Arc<dyn Reloadable>) -> bool {
        let path = target.observed_path();
        match self.observed.entry(path) {
            Entry::Occupied(entry) => {
                warn!(path = %entry.key().display(), "path already observed by another tree item");
                false
            }
            Entry::Vacant(slot) => {
                debug!(path = %slot.key().display(), "observing path");
                slot.insert(target);
                true
            }
        }
    }

    /// Stop observing a path.
    pub fn forget(&self, path: &Path) -> bool {
        self.observed.remove(path).is_some()
    }

    /// Number of observed paths.
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }
}

impl WatchListener for TreeChangeNotifier {
    fn on_event(&self, event: &WatchEvent) {
        if event.kind != WatchEventKind::Created {
            return;
        }
        let Some(parent) = event.path.parent() else {
            return;
        };
        match self.observed.get(parent) {
            Some(target) => {
                debug!(parent = %parent.display(), created = %event.path.display(), "refreshing observed node");
                target.request_refresh();
            }
            None => {
                // cannot materialize tree items never seen
                debug!(parent = %parent.display(), "create event for unobserved parent");
            }
        }
    }
}
