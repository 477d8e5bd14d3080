//! Lazily expanding tree item over a path node.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use arbor_cache::{LoadHandle, LoadOutcome};
use arbor_core::{LoadState, PathNode};
use arbor_watch::Reloadable;

use crate::browser::Engine;
use crate::error::TreeError;

struct ItemInner {
    node: Arc<PathNode>,
    engine: Arc<Engine>,
    state_tx: watch::Sender<LoadState>,
    state_rx: watch::Receiver<LoadState>,
    inflight: Mutex<Option<LoadHandle>>,
}

/// A cheaply cloneable adapter driving one node's lazy population.
///
/// With no cache configured, population is synchronous on the calling
/// thread. With a cache, population either adopts an already completed
/// entry, joins a pending one in the background, or starts a new
/// computation; the joining task applies the result and the
/// load-state transition, observable through
/// [`TreeItem::state_changes`]. At most one population is in flight
/// per item.
#[derive(Clone)]
pub struct TreeItem {
    inner: Arc<ItemInner>,
}

impl TreeItem {
    pub(crate) fn new(engine: Arc<Engine>, node: Arc<PathNode>) -> Self {
        let (state_tx, state_rx) = watch::channel(node.load_state());
        Self {
            inner: Arc::new(ItemInner {
                node,
                engine,
                state_tx,
                state_rx,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// The wrapped node.
    pub fn node(&self) -> &Arc<PathNode> {
        &self.inner.node
    }

    /// The node's path identity.
    pub fn path(&self) -> &Path {
        self.inner.node.path()
    }

    /// Current load state.
    pub fn state(&self) -> LoadState {
        self.inner.node.load_state()
    }

    /// Observe load-state transitions. The receiver can be awaited on
    /// whatever task the consumer designates for applying results.
    pub fn state_changes(&self) -> watch::Receiver<LoadState> {
        self.inner.state_rx.clone()
    }

    /// Snapshot of the children, triggering population as a side
    /// effect when the node is unloaded (or re-armed) and not a leaf.
    ///
    /// Never blocks when a cache is configured; without one, the first
    /// call lists the directory synchronously. The snapshot passes
    /// through the context's hidden-entry policy and current filter.
    pub fn children(&self) -> Vec<Arc<PathNode>> {
        let node = &self.inner.node;
        if !node.is_leaf() && node.load_state().can_begin_loading() {
            if let Err(err) = self.populate() {
                trace!(path = %node.path().display(), error = %err, "population already running");
            }
        }
        self.inner.engine.filter_children(node.current_children())
    }

    /// Explicitly start population.
    ///
    /// Leaves complete immediately with no children. Starting while a
    /// background population is already in flight is a programmer
    /// error and is reported, not silently ignored.
    pub fn populate(&self) -> Result<(), TreeError> {
        let node = &self.inner.node;
        if node.is_leaf() {
            return Ok(());
        }

        let mut inflight = self.inner.inflight.lock();
        if inflight.is_some() {
            return Err(TreeError::PopulationInFlight {
                path: node.path().to_path_buf(),
            });
        }
        if !node.begin_loading() {
            return Ok(());
        }
        self.set_state(LoadState::Loading);

        match self.inner.engine.preloader() {
            None => {
                // Synchronous population: acceptable for shallow or
                // fast listings. Release the in-flight slot first so a
                // concurrent reload is not blocked behind the listing.
                drop(inflight);
                let outcome = match self
                    .inner
                    .engine
                    .compute_children(node, &CancellationToken::new())
                {
                    Ok(children) => LoadOutcome::Loaded(children),
                    Err(err) if err.is_interrupted() => LoadOutcome::Canceled,
                    Err(err) => LoadOutcome::Failed(Arc::new(err)),
                };
                self.apply_outcome(None, outcome);
            }
            Some(preloader) => {
                let engine = Arc::clone(&self.inner.engine);
                let worker_node = Arc::clone(node);
                let handle = preloader.start_with_ttl(
                    node.path(),
                    self.inner.engine.ttl(),
                    move |cancel| engine.compute_children(&worker_node, cancel),
                );

                if let Some(outcome) = handle.try_outcome() {
                    // memoized and done: adopt with no further wait
                    drop(inflight);
                    self.apply_outcome(Some(&handle), outcome);
                } else {
                    // pending: join off the caller's thread
                    *inflight = Some(handle.clone());
                    drop(inflight);
                    let item = self.clone();
                    preloader.runtime().spawn(async move {
                        let outcome = handle.join().await;
                        item.finish(handle, outcome);
                    });
                }
            }
        }
        Ok(())
    }

    /// Cancel an in-flight population.
    ///
    /// The cache entry is evicted only if it still is the handle being
    /// cancelled, tolerating a fresher entry raced in for the key.
    pub fn cancel(&self) {
        let handle = self.inner.inflight.lock().take();
        let Some(handle) = handle else { return };

        debug!(path = %self.path().display(), "cancelling population");
        handle.cancel();
        if let Some(preloader) = self.inner.engine.preloader() {
            preloader.remove_if_same(self.path(), &handle);
        }
        self.inner.node.mark_canceled();
        self.set_state(LoadState::Canceled);
    }

    /// Reset to `NOT_LOADED`, discarding stale children and any cache
    /// entry for this node.
    pub fn request_reload(&self) {
        let handle = self.inner.inflight.lock().take();
        if let Some(handle) = handle {
            handle.cancel();
        }
        if let Some(preloader) = self.inner.engine.preloader() {
            let _ = preloader.remove(self.path());
        }
        self.inner.node.reset();
        self.set_state(LoadState::NotLoaded);
    }

    /// Discard current children and repopulate immediately.
    pub fn refresh(&self) {
        self.request_reload();
        if let Err(err) = self.populate() {
            debug!(path = %self.path().display(), error = %err, "refresh population refused");
        }
    }

    /// Locate an already-populated descendant by path.
    pub fn find(&self, path: &Path) -> Option<Arc<PathNode>> {
        self.inner.node.find(path)
    }

    fn finish(&self, handle: LoadHandle, outcome: LoadOutcome) {
        let mut inflight = self.inner.inflight.lock();
        let still_current = inflight
            .as_ref()
            .is_some_and(|current| current.id() == handle.id());
        if still_current {
            *inflight = None;
        }
        drop(inflight);

        // A cancel or reload already settled the node meanwhile.
        if !still_current {
            return;
        }
        self.apply_outcome(Some(&handle), outcome);
    }

    fn apply_outcome(&self, handle: Option<&LoadHandle>, outcome: LoadOutcome) {
        let node = &self.inner.node;
        match outcome {
            LoadOutcome::Loaded(mut children) => {
                self.inner.engine.sort(&mut children);
                debug!(path = %node.path().display(), count = children.len(), "children populated");
                node.complete_loaded(children);
                self.set_state(LoadState::Loaded);
            }
            LoadOutcome::Failed(error) => {
                debug!(path = %node.path().display(), error = %error, "population failed");
                node.complete_with_error(error);
                self.set_state(LoadState::LoadedWithError);
                // evict so a later access retries
                self.evict_if_same(handle);
            }
            LoadOutcome::Canceled => {
                node.mark_canceled();
                self.set_state(LoadState::Canceled);
                self.evict_if_same(handle);
            }
        }
    }

    fn evict_if_same(&self, handle: Option<&LoadHandle>) {
        if let (Some(preloader), Some(handle)) = (self.inner.engine.preloader(), handle) {
            preloader.remove_if_same(self.path(), handle);
        }
    }

    fn set_state(&self, state: LoadState) {
        self.inner.state_tx.send_replace(state);
    }
}

impl Reloadable for TreeItem {
    fn observed_path(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    fn request_refresh(&self) {
        self.refresh();
    }
}

impl std::fmt::Debug for TreeItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeItem")
            .field("path", &self.path())
            .field("state", &self.state())
            .finish()
    }
}
