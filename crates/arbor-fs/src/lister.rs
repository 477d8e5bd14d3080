//! Blocking single-directory lister with cooperative cancellation.

use std::fs;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use arbor_core::{BrowseConfig, ListError, PathNode};

use crate::factory::node_from_path;

/// Lists the direct children of one directory at a time.
///
/// Listing is a blocking call meant for a worker thread; it checks the
/// cancellation token every [`BrowseConfig::cancel_check_every`]
/// entries and bails out with [`ListError::Interrupted`]. Ignore
/// patterns are applied here; hidden-entry filtering happens at
/// snapshot time so that toggling visibility never forces a re-list.
#[derive(Debug, Clone)]
pub struct DirLister {
    config: BrowseConfig,
}

impl DirLister {
    /// Create a lister with the given configuration.
    pub fn new(config: BrowseConfig) -> Self {
        Self { config }
    }

    /// The configuration this lister applies.
    pub fn config(&self) -> &BrowseConfig {
        &self.config
    }

    /// Enumerate the children of `parent`.
    ///
    /// Leaves (non-directories, unreadable directories, unmounted
    /// drives) produce an empty list without touching the filesystem.
    /// Entries whose attributes cannot be probed are skipped.
    pub fn list(
        &self,
        parent: &Arc<PathNode>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<PathNode>>, ListError> {
        if parent.is_leaf() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ListError::Interrupted);
        }

        let path = parent.path();
        let entries = fs::read_dir(path).map_err(|e| ListError::io(path, e))?;

        let mut children = Vec::new();
        for (index, entry) in entries.enumerate() {
            if index % self.config.cancel_check_every == 0 && cancel.is_cancelled() {
                debug!(path = %path.display(), "listing interrupted");
                return Err(ListError::Interrupted);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name();
            if self.config.should_ignore(&name.to_string_lossy()) {
                continue;
            }

            match node_from_path(&entry.path(), &self.config, Some(parent)) {
                Ok(node) => children.push(node),
                Err(err) => {
                    debug!(entry = %entry.path().display(), error = %err, "skipping entry");
                    continue;
                }
            }
        }

        Ok(children)
    }
}
