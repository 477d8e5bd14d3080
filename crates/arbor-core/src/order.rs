//! Child ordering and filtering hooks.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::node::PathNode;

/// Pluggable comparator applied to a node's children at population
/// time.
pub type NodeComparator = Arc<dyn Fn(&PathNode, &PathNode) -> Ordering + Send + Sync>;

/// Pluggable predicate applied when snapshotting cached children.
pub type NodeFilter = Arc<dyn Fn(&PathNode) -> bool + Send + Sync>;

/// Default child ordering: directories before files, then
/// case-insensitive by name, with the case-sensitive name and the full
/// path as tiebreakers.
pub fn default_order(a: &PathNode, b: &PathNode) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(b.name()))
            .then_with(|| a.path().cmp(b.path())),
    }
}

/// The default comparator as a shareable handle.
pub fn default_comparator() -> NodeComparator {
    Arc::new(default_order)
}

/// Sort a child list in place with the given comparator.
pub fn sort_children(children: &mut [Arc<PathNode>], comparator: &NodeComparator) {
    children.sort_by(|a, b| comparator(a, b));
}
