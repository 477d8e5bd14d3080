//! Handles to in-flight child computations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use arbor_core::{ListError, PathNode};

/// Outcome of one child-population computation.
///
/// All holders of handles for the same key observe the same outcome.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The listing completed.
    Loaded(Vec<Arc<PathNode>>),
    /// The listing failed; the error is shared with every waiter.
    Failed(Arc<ListError>),
    /// The listing was cancelled before completing.
    Canceled,
}

impl LoadOutcome {
    /// Whether the computation was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Whether the computation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A cloneable handle to the single computation for one key.
///
/// The handle identity (`id`) is what compare-and-remove eviction
/// matches on, so cancelling a stale handle can never evict a fresher
/// entry raced in for the same key.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    id: u64,
    key: PathBuf,
    cancel: CancellationToken,
    rx: watch::Receiver<Option<LoadOutcome>>,
}

impl LoadHandle {
    pub(crate) fn new(
        id: u64,
        key: PathBuf,
        cancel: CancellationToken,
        rx: watch::Receiver<Option<LoadOutcome>>,
    ) -> Self {
        Self {
            id,
            key,
            cancel,
            rx,
        }
    }

    /// Unique identity of this computation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The key this computation is for.
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Whether the computation has reached an outcome.
    pub fn is_done(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The outcome, when already available. Never blocks.
    pub fn try_outcome(&self) -> Option<LoadOutcome> {
        self.rx.borrow().clone()
    }

    /// Request cooperative cancellation of the computation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the outcome. Blocks only the joining task.
    pub async fn join(&self) -> LoadOutcome {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(LoadOutcome::Canceled),
            // The worker was torn down without publishing an outcome.
            Err(_) => LoadOutcome::Canceled,
        }
    }
}
