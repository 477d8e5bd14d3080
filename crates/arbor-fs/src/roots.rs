//! Discovery of the directories shown under the tree root.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use arbor_core::{BrowseConfig, PathNode};

use crate::factory::node_from_path;

/// The OS root directories.
#[cfg(unix)]
pub fn os_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

/// The OS root directories (drive letters).
#[cfg(windows)]
pub fn os_roots() -> Vec<PathBuf> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|p| p.exists())
        .collect()
}

/// The current user's home directory, when known.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Build the directory children of the root node: the OS roots plus
/// the user home directory. Paths that cannot be probed are skipped.
pub fn root_children(root: &Arc<PathNode>, config: &BrowseConfig) -> Vec<Arc<PathNode>> {
    let mut paths = os_roots();
    if let Some(home) = home_dir() {
        if !paths.contains(&home) {
            paths.push(home);
        }
    }

    let mut children = Vec::with_capacity(paths.len());
    for path in paths {
        match node_from_path(&path, config, Some(root)) {
            Ok(node) => children.push(node),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping root entry");
            }
        }
    }
    children
}
