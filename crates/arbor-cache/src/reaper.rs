//! Expiry reaper for time-bounded cache entries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::debug;

use crate::handle::LoadHandle;

struct Expiry {
    key: PathBuf,
    id: u64,
    ttl: Duration,
}

/// A single background task draining a delay-ordered queue of cache
/// expirations.
///
/// Created lazily on the first time-bounded entry. Eviction matches
/// the exact handle identity scheduled with the deadline, so an entry
/// replaced in the meantime survives its predecessor's expiry.
#[derive(Clone)]
pub(crate) struct Reaper {
    tx: mpsc::UnboundedSender<Expiry>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reaper {
    pub(crate) fn spawn(runtime: &Handle, entries: Arc<DashMap<PathBuf, LoadHandle>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Expiry>();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = runtime.spawn(async move {
            let mut queue: DelayQueue<(PathBuf, u64)> = DelayQueue::new();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(expiry) => {
                            queue.insert((expiry.key, expiry.id), expiry.ttl);
                        }
                        None => break,
                    },
                    expired = std::future::poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                        if let Some(expired) = expired {
                            let (key, id) = expired.into_inner();
                            let evicted = entries
                                .remove_if(&key, |_, entry| entry.id() == id)
                                .is_some();
                            if evicted {
                                debug!(key = %key.display(), id, "expired preload entry evicted");
                            }
                        }
                    }
                }
            }
            debug!("cache reaper stopped");
        });

        Self {
            tx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Schedule eviction of `(key, id)` after `ttl`.
    pub(crate) fn schedule(&self, key: PathBuf, id: u64, ttl: Duration) {
        let _ = self.tx.send(Expiry { key, id, ttl });
    }

    /// Stop the reaper task and wait for it to exit.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
