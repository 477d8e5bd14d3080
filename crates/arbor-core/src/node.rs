//! Path node types and the lazily populated tree.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use compact_str::CompactString;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ListError;
use crate::state::LoadState;

/// Logical type of a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DriveKind {
    /// Whole disk.
    Disk,
    /// Partition of a disk.
    Partition,
    /// Optical / read-only medium.
    Rom,
}

/// Physical transport of a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Nvme,
    Usb,
    Sata,
    Ata,
    /// Unknown or unreported transport.
    Other,
}

impl Transport {
    /// Parse a transport as reported by the block-device source,
    /// mapping unknown strings to [`Transport::Other`].
    pub fn from_report(s: &str) -> Self {
        s.parse().unwrap_or(Transport::Other)
    }
}

/// Metadata carried by drive nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveInfo {
    /// Whether the device is currently mounted.
    pub mounted: bool,
    /// Logical device type.
    pub kind: DriveKind,
    /// Physical transport.
    pub transport: Transport,
    /// Total capacity in bytes.
    pub total: u64,
    /// Available bytes (0 when unmounted or unreported).
    pub available: u64,
    /// Filesystem type string, when known.
    pub fs_type: Option<CompactString>,
}

impl DriveInfo {
    /// Used bytes derived from total and available capacity.
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

/// Variant of a path node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Regular filesystem entry (file, directory or symlink).
    Regular,
    /// Block device (disk, partition, optical drive).
    Drive(DriveInfo),
    /// The synthetic tree root.
    Root,
}

/// Filesystem attributes shared by all node variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeAttrs {
    /// Whether the entry is a directory (or directory-like, for
    /// mounted drives and the root).
    pub is_dir: bool,
    /// Whether the entry is a symbolic link.
    pub is_link: bool,
    /// Whether the entry is hidden.
    pub is_hidden: bool,
    /// Whether the entry can be read.
    pub is_readable: bool,
    /// Size in bytes; `None` for directories.
    pub len: Option<u64>,
    /// Creation time; `None` when unreadable or unreported.
    pub created: Option<SystemTime>,
}

impl NodeAttrs {
    /// Attributes for a readable directory.
    pub fn directory(created: Option<SystemTime>) -> Self {
        Self {
            is_dir: true,
            is_readable: true,
            created,
            ..Self::default()
        }
    }

    /// Attributes for a regular file.
    pub fn file(len: u64, created: Option<SystemTime>) -> Self {
        Self {
            is_readable: true,
            len: Some(len),
            created,
            ..Self::default()
        }
    }
}

/// Child slot of a node.
///
/// Either not yet populated, or populated completely (possibly empty,
/// possibly with a retained enumeration error), never partial.
#[derive(Debug, Default)]
struct ChildSlot {
    state: LoadState,
    children: Vec<Arc<PathNode>>,
    error: Option<Arc<ListError>>,
}

/// One filesystem entry and its lazily populated children.
///
/// Identity (equality, hashing, ordering ties) is the path. The child
/// slot is guarded by a read-write lock; mutation is confined to the
/// single task completing a population, so readers only ever observe a
/// fully populated or fully empty slot.
#[derive(Debug)]
pub struct PathNode {
    path: PathBuf,
    name: CompactString,
    kind: NodeKind,
    attrs: NodeAttrs,
    parent: Option<Weak<PathNode>>,
    slot: RwLock<ChildSlot>,
}

impl PathNode {
    /// Create a node of the given variant.
    pub fn new(
        path: impl Into<PathBuf>,
        kind: NodeKind,
        attrs: NodeAttrs,
        parent: Option<&Arc<PathNode>>,
    ) -> Arc<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(path.to_string_lossy()));
        Arc::new(Self {
            path,
            name,
            kind,
            attrs,
            parent: parent.map(Arc::downgrade),
            slot: RwLock::new(ChildSlot::default()),
        })
    }

    /// Create a regular node.
    pub fn regular(
        path: impl Into<PathBuf>,
        attrs: NodeAttrs,
        parent: Option<&Arc<PathNode>>,
    ) -> Arc<Self> {
        Self::new(path, NodeKind::Regular, attrs, parent)
    }

    /// Create a drive node. Unmounted drives are leaves regardless of
    /// their actual content.
    pub fn drive(
        path: impl Into<PathBuf>,
        info: DriveInfo,
        parent: Option<&Arc<PathNode>>,
    ) -> Arc<Self> {
        let attrs = NodeAttrs {
            is_dir: info.mounted,
            is_readable: info.mounted,
            ..NodeAttrs::default()
        };
        Self::new(path, NodeKind::Drive(info), attrs, parent)
    }

    /// Create the synthetic root node. The root is never unreadable.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            path: PathBuf::new(),
            name: CompactString::const_new("Computer"),
            kind: NodeKind::Root,
            attrs: NodeAttrs {
                is_dir: true,
                is_readable: true,
                ..NodeAttrs::default()
            },
            parent: None,
            slot: RwLock::new(ChildSlot::default()),
        })
    }

    /// Path identity of this node.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name (final path component).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node variant.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Shared filesystem attributes.
    pub fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    /// Human-readable description of the variant.
    pub fn description(&self) -> String {
        match &self.kind {
            NodeKind::Root => "Computer".to_string(),
            NodeKind::Drive(info) => format!("{} {} drive", info.transport, info.kind),
            NodeKind::Regular if self.attrs.is_link => "Symbolic link".to_string(),
            NodeKind::Regular if self.attrs.is_dir => "Directory".to_string(),
            NodeKind::Regular => "File".to_string(),
        }
    }

    /// Parent node, if still alive.
    pub fn parent(&self) -> Option<Arc<PathNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Depth below the root (the root is 0).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            depth += 1;
            cursor = node.parent();
        }
        depth
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.attrs.is_dir
    }

    /// Check if this node is a symbolic link.
    pub fn is_link(&self) -> bool {
        self.attrs.is_link
    }

    /// Check if this node is hidden.
    pub fn is_hidden(&self) -> bool {
        self.attrs.is_hidden
    }

    /// Check if this node is readable.
    pub fn is_readable(&self) -> bool {
        self.attrs.is_readable
    }

    /// Drive metadata for drive nodes.
    pub fn drive_info(&self) -> Option<&DriveInfo> {
        match &self.kind {
            NodeKind::Drive(info) => Some(info),
            _ => None,
        }
    }

    /// Whether this node can never have children: non-directories,
    /// unreadable directories and unmounted drives.
    pub fn is_leaf(&self) -> bool {
        if let NodeKind::Drive(info) = &self.kind {
            if !info.mounted {
                return true;
            }
        }
        !self.attrs.is_dir || !self.attrs.is_readable
    }

    /// Current load state of the child slot.
    pub fn load_state(&self) -> LoadState {
        self.slot.read().state
    }

    /// Snapshot of the currently populated children (empty when the
    /// slot has not been populated).
    pub fn current_children(&self) -> Vec<Arc<PathNode>> {
        self.slot.read().children.clone()
    }

    /// The enumeration error retained by the last failed population.
    pub fn creation_error(&self) -> Option<Arc<ListError>> {
        self.slot.read().error.clone()
    }

    /// Attempt the transition into `LOADING`.
    ///
    /// Re-arms `CANCELED` and `LOADED_WITH_ERROR` slots by discarding
    /// their stale children and error. Returns `false` when a
    /// population is already in flight or the node is loaded.
    pub fn begin_loading(&self) -> bool {
        let mut slot = self.slot.write();
        if !slot.state.can_begin_loading() {
            return false;
        }
        slot.children.clear();
        slot.error = None;
        slot.state = LoadState::Loading;
        true
    }

    /// Complete a population with the given (sorted) children.
    pub fn complete_loaded(&self, children: Vec<Arc<PathNode>>) {
        let mut slot = self.slot.write();
        debug_assert_eq!(slot.state, LoadState::Loading);
        slot.children = children;
        slot.error = None;
        slot.state = LoadState::Loaded;
    }

    /// Complete a population that failed: the child list stays empty
    /// and the error is retained for [`PathNode::creation_error`].
    pub fn complete_with_error(&self, error: Arc<ListError>) {
        let mut slot = self.slot.write();
        debug_assert_eq!(slot.state, LoadState::Loading);
        slot.children.clear();
        slot.error = Some(error);
        slot.state = LoadState::LoadedWithError;
    }

    /// Mark an in-flight population as cancelled.
    pub fn mark_canceled(&self) {
        let mut slot = self.slot.write();
        slot.children.clear();
        slot.error = None;
        slot.state = LoadState::Canceled;
    }

    /// Discard any populated children and return to `NOT_LOADED`.
    pub fn reset(&self) {
        *self.slot.write() = ChildSlot::default();
    }

    /// Descend through already-populated children to locate a node by
    /// path. Never triggers population.
    pub fn find(self: &Arc<Self>, path: &Path) -> Option<Arc<PathNode>> {
        if self.path == path {
            return Some(Arc::clone(self));
        }
        let children = self.current_children();
        for child in children {
            if path.starts_with(child.path()) {
                return child.find(path);
            }
        }
        None
    }
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for PathNode {}

impl Hash for PathNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        crate::order::default_order(self, other)
    }
}
