//! The browsing context: explicitly constructed, explicitly shut down.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use arbor_cache::Preloader;
use arbor_core::{
    default_comparator, sort_children, BrowseConfig, ListError, NodeComparator, NodeFilter,
    NodeKind, PathNode,
};
use arbor_fs::{drive_node, root_children, DirLister, DriveSource};
use arbor_service::{Schedule, ServiceHandle, ServiceRunner};
use arbor_watch::{DirectoryWatcher, TreeChangeNotifier, WatchListener};

use crate::error::BrowseError;
use crate::item::TreeItem;
use crate::rescan::DriveRescan;

/// Shared machinery behind every tree item of one browser.
pub(crate) struct Engine {
    config: BrowseConfig,
    lister: DirLister,
    preloader: Option<Arc<Preloader>>,
    comparator: NodeComparator,
    filter: RwLock<Option<NodeFilter>>,
    drives: Option<Arc<dyn DriveSource>>,
    ttl: Option<Duration>,
}

impl Engine {
    pub(crate) fn preloader(&self) -> Option<&Arc<Preloader>> {
        self.preloader.as_ref()
    }

    pub(crate) fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub(crate) fn sort(&self, children: &mut [Arc<PathNode>]) {
        sort_children(children, &self.comparator);
    }

    /// Apply the hidden-entry policy and the current filter to a raw
    /// child snapshot. Cached children are re-filtered on every
    /// snapshot, so changing the filter never forces a re-list.
    pub(crate) fn filter_children(&self, children: Vec<Arc<PathNode>>) -> Vec<Arc<PathNode>> {
        let filter = self.filter.read().clone();
        children
            .into_iter()
            .filter(|child| self.config.include_hidden || !child.is_hidden())
            .filter(|child| filter.as_ref().is_none_or(|keep| keep(child)))
            .collect()
    }

    /// Compute a node's children from its backing source.
    pub(crate) fn compute_children(
        &self,
        node: &Arc<PathNode>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<PathNode>>, ListError> {
        match node.kind() {
            NodeKind::Root => Ok(self.root_entries(node)),
            _ => self.lister.list(node, cancel),
        }
    }

    /// Root children: the OS roots, the home directory and the
    /// enumerated drives, deduplicated by path identity.
    fn root_entries(&self, root: &Arc<PathNode>) -> Vec<Arc<PathNode>> {
        let mut children = root_children(root, &self.config);

        if let Some(source) = &self.drives {
            match source.drives() {
                Ok(records) => {
                    for record in records {
                        if let Some(node) = drive_node(&record, Some(root)) {
                            if children.iter().any(|c| c.path() == node.path()) {
                                continue;
                            }
                            children.push(node);
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "drive enumeration failed, listing directories only");
                }
            }
        }
        children
    }
}

/// Builder for [`Browser`].
pub struct BrowserBuilder {
    config: BrowseConfig,
    cache: bool,
    watcher: bool,
    recursive_watch: bool,
    comparator: NodeComparator,
    drives: Option<Arc<dyn DriveSource>>,
}

impl BrowserBuilder {
    /// Browse configuration.
    pub fn config(mut self, config: BrowseConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable the preloading cache (enabled by default).
    /// Without a cache every population is synchronous.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Enable or disable the filesystem watcher (enabled by default).
    pub fn watcher(mut self, enabled: bool) -> Self {
        self.watcher = enabled;
        self
    }

    /// Register new subdirectories reactively when they appear under
    /// a watched directory.
    pub fn recursive_watch(mut self, enabled: bool) -> Self {
        self.recursive_watch = enabled;
        self
    }

    /// Child ordering applied at population time.
    pub fn comparator(mut self, comparator: NodeComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Block-device source for drive nodes under the root.
    pub fn drive_source(mut self, source: Arc<dyn DriveSource>) -> Self {
        self.drives = Some(source);
        self
    }

    /// Build the browser.
    ///
    /// Must run inside a Tokio runtime when the cache is enabled: the
    /// preloader captures the runtime its workers spawn on.
    pub fn build(self) -> Result<Browser, BrowseError> {
        let preloader = self.cache.then(|| Arc::new(Preloader::new()));
        let ttl = self.config.effective_ttl();

        let notifier = Arc::new(TreeChangeNotifier::new());
        let watcher = if self.watcher {
            let watcher = DirectoryWatcher::spawn(self.recursive_watch)?;
            let listener: Arc<dyn WatchListener> = Arc::clone(&notifier) as Arc<dyn WatchListener>;
            watcher.add_listener(listener);
            Some(watcher)
        } else {
            None
        };

        let engine = Arc::new(Engine {
            lister: DirLister::new(self.config.clone()),
            config: self.config,
            preloader,
            comparator: self.comparator,
            filter: RwLock::new(None),
            drives: self.drives,
            ttl,
        });

        debug!(
            cache = engine.preloader.is_some(),
            watch = watcher.is_some(),
            "browser built"
        );
        Ok(Browser {
            engine,
            watcher,
            notifier,
            services: Mutex::new(Vec::new()),
            root: Mutex::new(None),
        })
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self {
            config: BrowseConfig::default(),
            cache: true,
            watcher: true,
            recursive_watch: false,
            comparator: default_comparator(),
            drives: None,
        }
    }
}

/// Owns one live file tree: configuration, cache, watcher, notifier,
/// comparator, filter and background services, with clear ownership
/// and an explicit shutdown draining all pending work.
pub struct Browser {
    engine: Arc<Engine>,
    watcher: Option<DirectoryWatcher>,
    notifier: Arc<TreeChangeNotifier>,
    services: Mutex<Vec<ServiceHandle>>,
    root: Mutex<Option<TreeItem>>,
}

impl Browser {
    /// Create a browser builder.
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::default()
    }

    /// The browse configuration.
    pub fn config(&self) -> &BrowseConfig {
        &self.engine.config
    }

    /// The preloading cache, when configured.
    pub fn preloader(&self) -> Option<&Arc<Preloader>> {
        self.engine.preloader()
    }

    /// The directory watcher, when configured.
    pub fn watcher(&self) -> Option<&DirectoryWatcher> {
        self.watcher.as_ref()
    }

    /// The root item of this browser: one per context, depth 0, its
    /// children being the OS roots, the home directory and the drives.
    pub fn root(&self) -> TreeItem {
        self.root
            .lock()
            .get_or_insert_with(|| TreeItem::new(Arc::clone(&self.engine), PathNode::root()))
            .clone()
    }

    /// Build a tree item for an arbitrary path.
    pub fn item(&self, path: &Path) -> Result<TreeItem, ListError> {
        let node = arbor_fs::node_from_path(path, &self.engine.config, None)?;
        Ok(TreeItem::new(Arc::clone(&self.engine), node))
    }

    /// Watch the directory behind `item` and keep it live: entries
    /// created under it repopulate the item without an explicit
    /// reload. One watch maps to one authoritative tree position, so
    /// observing an already observed path is rejected.
    pub fn watch(&self, item: &TreeItem) -> Result<(), BrowseError> {
        let watcher = self.watcher.as_ref().ok_or(BrowseError::NoWatcher)?;
        if !item.node().is_dir() {
            return Err(BrowseError::NotADirectory {
                path: item.path().to_path_buf(),
            });
        }
        if !self.notifier.observe(Arc::new(item.clone())) {
            return Err(BrowseError::AlreadyObserved {
                path: item.path().to_path_buf(),
            });
        }
        if let Err(err) = watcher.register(item.path()) {
            self.notifier.forget(item.path());
            return Err(err.into());
        }
        Ok(())
    }

    /// Stop watching a path.
    pub fn unwatch(&self, path: &Path) {
        self.notifier.forget(path);
        if let Some(watcher) = &self.watcher {
            watcher.unregister(path);
        }
    }

    /// Replace the current child filter. Applied by re-filtering
    /// cached children at snapshot time; no re-listing happens.
    pub fn set_filter(&self, filter: Option<NodeFilter>) {
        *self.engine.filter.write() = filter;
    }

    /// Periodically re-enumerate drives and refresh the root's
    /// children.
    pub fn start_drive_rescan(&self, period: Duration) {
        let handle = ServiceRunner::start(
            Arc::new(DriveRescan::new(self.root())),
            Schedule::Every(period),
        );
        self.services.lock().push(handle);
    }

    /// Stop services and the watcher, then drain the cache,
    /// cancelling all outstanding populations.
    pub async fn shutdown(&self) {
        info!("browser shutting down");
        let services: Vec<ServiceHandle> = std::mem::take(&mut *self.services.lock());
        for service in services {
            service.stop().await;
        }
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
        if let Some(preloader) = self.engine.preloader() {
            preloader.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("cache", &self.engine.preloader.is_some())
            .field("watcher", &self.watcher.is_some())
            .field("observed", &self.notifier.observed_count())
            .finish()
    }
}
