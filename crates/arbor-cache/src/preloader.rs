//! The preloader: at-most-one child computation per key.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use arbor_core::{ListError, PathNode};

use crate::error::CacheError;
use crate::handle::{LoadHandle, LoadOutcome};
use crate::reaper::Reaper;

/// Key → in-flight-or-completed computation cache.
///
/// Computations run on the runtime's blocking pool, decoupled from the
/// caller; `start` and `get` never block. The entry map is the only
/// broadly shared structure and is a concurrent map; its sharded entry
/// API makes the insert-or-reuse decision atomic, so exactly one
/// computation ever starts per key.
pub struct Preloader {
    entries: Arc<DashMap<PathBuf, LoadHandle>>,
    next_id: AtomicU64,
    runtime: Handle,
    reaper: Mutex<Option<Reaper>>,
}

impl Preloader {
    /// Create a preloader on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime context.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    /// Create a preloader spawning its workers on the given runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            runtime,
            reaper: Mutex::new(None),
        }
    }

    /// The runtime this preloader spawns workers on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Begin computing the children for `key`, or return the handle of
    /// the computation already known for it (pending or done).
    pub fn start<F>(&self, key: &Path, compute: F) -> LoadHandle
    where
        F: FnOnce(&CancellationToken) -> Result<Vec<Arc<PathNode>>, ListError> + Send + 'static,
    {
        self.start_with_ttl(key, None, compute)
    }

    /// Like [`Preloader::start`], additionally scheduling eviction of
    /// the entry once `ttl` elapses. `None` and zero durations mean
    /// the entry never expires. Expiry evicts the exact handle
    /// scheduled here and never cancels an in-flight computation.
    pub fn start_with_ttl<F>(&self, key: &Path, ttl: Option<Duration>, compute: F) -> LoadHandle
    where
        F: FnOnce(&CancellationToken) -> Result<Vec<Arc<PathNode>>, ListError> + Send + 'static,
    {
        let mut started = false;
        let handle = self
            .entries
            .entry(key.to_path_buf())
            .or_insert_with(|| {
                started = true;
                self.spawn_computation(key, compute)
            })
            .clone();

        if started {
            if let Some(ttl) = ttl.filter(|d| !d.is_zero()) {
                self.reaper().schedule(key.to_path_buf(), handle.id(), ttl);
            }
        }
        handle
    }

    /// The handle for a known key.
    pub fn get(&self, key: &Path) -> Result<LoadHandle, CacheError> {
        self.entries
            .get(key)
            .map(|entry| entry.clone())
            .ok_or_else(|| CacheError::UnknownKey {
                path: key.to_path_buf(),
            })
    }

    /// Whether `key` has an entry, pending or done.
    pub fn is_memoized(&self, key: &Path) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict the entry for a known key, returning its handle.
    pub fn remove(&self, key: &Path) -> Result<LoadHandle, CacheError> {
        self.entries
            .remove(key)
            .map(|(_, handle)| handle)
            .ok_or_else(|| CacheError::UnknownKey {
                path: key.to_path_buf(),
            })
    }

    /// Evict the entry for `key` only if it still is `handle`.
    ///
    /// Atomic compare-and-remove: a fresher entry raced in for the
    /// same key is left untouched and `false` is returned.
    pub fn remove_if_same(&self, key: &Path, handle: &LoadHandle) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.id() == handle.id())
            .is_some()
    }

    /// Drain every entry, returning the handles. Used at shutdown.
    pub fn remove_all(&self) -> Vec<LoadHandle> {
        let mut handles = Vec::with_capacity(self.entries.len());
        self.entries.retain(|_, handle| {
            handles.push(handle.clone());
            false
        });
        handles
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stop the reaper, drain the cache and cancel every outstanding
    /// computation.
    pub async fn shutdown(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }
        let handles = self.remove_all();
        debug!(drained = handles.len(), "preloader shut down");
        for handle in handles {
            handle.cancel();
        }
    }

    fn reaper(&self) -> Reaper {
        self.reaper
            .lock()
            .get_or_insert_with(|| Reaper::spawn(&self.runtime, Arc::clone(&self.entries)))
            .clone()
    }

    fn spawn_computation<F>(&self, key: &Path, compute: F) -> LoadHandle
    where
        F: FnOnce(&CancellationToken) -> Result<Vec<Arc<PathNode>>, ListError> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = key.to_path_buf();
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);

        debug!(key = %key.display(), id, "starting child computation");

        let token = cancel.clone();
        let worker_key = key.clone();
        self.runtime.spawn(async move {
            let worker_token = token.clone();
            let result = tokio::task::spawn_blocking(move || compute(&worker_token)).await;
            let outcome = match result {
                _ if token.is_cancelled() => LoadOutcome::Canceled,
                Ok(Ok(children)) => LoadOutcome::Loaded(children),
                Ok(Err(err)) if err.is_interrupted() => LoadOutcome::Canceled,
                Ok(Err(err)) => LoadOutcome::Failed(Arc::new(err)),
                Err(join_err) => {
                    warn!(key = %worker_key.display(), error = %join_err, "child computation worker died");
                    LoadOutcome::Failed(Arc::new(ListError::Io {
                        path: worker_key.clone(),
                        source: std::io::Error::other(join_err.to_string()),
                    }))
                }
            };
            let _ = tx.send(Some(outcome));
        });

        LoadHandle::new(id, key, cancel, rx)
    }
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}
