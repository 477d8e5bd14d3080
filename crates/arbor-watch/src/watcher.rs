//! Per-directory native watches with a dedicated dispatch thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use notify::event::Flag;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{WatchEvent, WatchEventKind, WatchListener};

/// Errors from watch registration.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watcher has been stopped; no further registrations.
    #[error("Watcher already stopped")]
    Stopped,

    /// The native watch backend refused the operation.
    #[error("Native watch failure: {source}")]
    Native {
        #[from]
        source: notify::Error,
    },

    /// The dispatch thread could not be spawned.
    #[error("Failed to spawn watch thread: {source}")]
    Thread {
        #[source]
        source: std::io::Error,
    },
}

enum LoopControl {
    Continue,
    Stop,
}

struct WatcherShared {
    /// Dropping the native watcher closes the event channel, which
    /// the loop observes as end-of-stream.
    native: Mutex<Option<RecommendedWatcher>>,
    registry: DashMap<PathBuf, ()>,
    listeners: RwLock<Vec<Arc<dyn WatchListener>>>,
    recursive: bool,
    paused: AtomicBool,
}

/// Watches registered directories and fans typed events out to
/// listeners from one dedicated thread.
///
/// Each registered directory holds its own non-recursive native
/// watch; with `recursive` mode, registering a directory walks its
/// subtree and newly created subdirectories are registered reactively.
pub struct DirectoryWatcher {
    shared: Arc<WatcherShared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl DirectoryWatcher {
    /// Create a watcher and start its dispatch thread.
    pub fn spawn(recursive: bool) -> Result<Self, WatchError> {
        let (tx, rx) = std::sync::mpsc::channel();
        let native = notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        })?;

        let shared = Arc::new(WatcherShared {
            native: Mutex::new(Some(native)),
            registry: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            recursive,
            paused: AtomicBool::new(false),
        });

        let loop_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("arbor-watch".to_string())
            .spawn(move || loop_shared.run(rx))
            .map_err(|e| WatchError::Thread { source: e })?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Add a listener. Fan-out follows registration order.
    pub fn add_listener(&self, listener: Arc<dyn WatchListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Begin watching one directory. Registering an already watched
    /// directory is a no-op.
    pub fn register(&self, path: &Path) -> Result<(), WatchError> {
        self.shared.register_path(path).map(|_| ())
    }

    /// Walk the subtree at `path` and register every directory found.
    /// Returns how many directories are newly watched. Unwalkable
    /// entries are skipped.
    pub fn register_tree(&self, path: &Path) -> Result<usize, WatchError> {
        let mut registered = 0;
        for entry in jwalk::WalkDir::new(path)
            .skip_hidden(false)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "skipping unwalkable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() && self.shared.register_path(&entry.path())? {
                registered += 1;
            }
        }
        info!(root = %path.display(), registered, "registered directory tree");
        Ok(registered)
    }

    /// Stop watching one directory.
    pub fn unregister(&self, path: &Path) {
        if self.shared.registry.remove(path).is_some() {
            if let Some(native) = self.shared.native.lock().as_mut() {
                let _ = native.unwatch(path);
            }
        }
    }

    /// Whether a directory is currently registered.
    pub fn is_registered(&self, path: &Path) -> bool {
        self.shared.registry.contains_key(path)
    }

    /// Number of registered directories.
    pub fn watched_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Drop events without tearing down native watches.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Relaxed);
    }

    /// Resume event delivery.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Relaxed);
    }

    /// Whether event delivery is paused.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Relaxed)
    }

    /// Close the native watcher and join the dispatch thread.
    ///
    /// Closing drops the event channel's sender; the loop observes
    /// end-of-stream and exits promptly.
    pub fn stop(&self) {
        self.shared.native.lock().take();
        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WatcherShared {
    /// Returns `true` when the directory is newly watched.
    fn register_path(&self, path: &Path) -> Result<bool, WatchError> {
        match self.registry.entry(path.to_path_buf()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let mut guard = self.native.lock();
                let native = guard.as_mut().ok_or(WatchError::Stopped)?;
                native.watch(path, RecursiveMode::NonRecursive)?;
                slot.insert(());
                debug!(path = %path.display(), "watching directory");
                Ok(true)
            }
        }
    }

    fn run(&self, rx: Receiver<notify::Result<Event>>) {
        info!("watch loop started");
        loop {
            match rx.recv() {
                Ok(message) => {
                    if let LoopControl::Stop = self.handle_message(message) {
                        break;
                    }
                }
                Err(_) => {
                    debug!("watch channel closed");
                    break;
                }
            }
        }
        info!("watch loop exited");
    }

    fn handle_message(&self, message: notify::Result<Event>) -> LoopControl {
        match message {
            Ok(event) => {
                self.dispatch_event(event);
                LoopControl::Continue
            }
            Err(error) => self.handle_watch_error(error),
        }
    }

    fn dispatch_event(&self, event: Event) {
        if self.paused.load(Ordering::Relaxed) {
            return;
        }

        let kind = if event.flag() == Some(Flag::Rescan) {
            Some(WatchEventKind::Overflow)
        } else {
            match event.kind {
                EventKind::Create(_) => Some(WatchEventKind::Created),
                EventKind::Modify(_) => Some(WatchEventKind::Modified),
                EventKind::Remove(_) => Some(WatchEventKind::Deleted),
                _ => None,
            }
        };
        let Some(kind) = kind else { return };

        for path in event.paths {
            self.dispatch_one(kind, path);
        }
    }

    fn dispatch_one(&self, kind: WatchEventKind, path: PathBuf) {
        let dir = match path.parent() {
            Some(parent) if self.registry.contains_key(parent) => parent.to_path_buf(),
            _ if self.registry.contains_key(&path) => path.clone(),
            _ => {
                debug!(path = %path.display(), kind = %kind, "event for unwatched path");
                for listener in self.listeners.read().iter() {
                    listener.on_unknown_source(&path);
                }
                return;
            }
        };

        if kind == WatchEventKind::Deleted && self.registry.remove(&path).is_some() {
            // the OS tears the native watch down with the directory
            debug!(path = %path.display(), "watched directory deleted");
        }

        if kind == WatchEventKind::Created && self.recursive && path.is_dir() {
            if let Err(err) = self.register_path(&path) {
                warn!(path = %path.display(), error = %err, "reactive registration failed");
            }
        }

        let event = WatchEvent { kind, path, dir };
        for listener in self.listeners.read().iter() {
            listener.on_event(&event);
        }
    }

    fn handle_watch_error(&self, error: notify::Error) -> LoopControl {
        warn!(error = %error, "native watch error");
        if error.paths.is_empty() {
            return LoopControl::Continue;
        }

        for path in &error.paths {
            if self.registry.remove(path).is_some() {
                if let Some(native) = self.native.lock().as_mut() {
                    let _ = native.unwatch(path);
                }
                warn!(path = %path.display(), "watch could not be re-armed, dropping");
                for listener in self.listeners.read().iter() {
                    listener.on_reset_failed(path);
                }
            }
        }

        if self.registry.is_empty() {
            for listener in self.listeners.read().iter() {
                listener.on_watch_list_empty();
            }
            return LoopControl::Stop;
        }
        LoopControl::Continue
    }
}
