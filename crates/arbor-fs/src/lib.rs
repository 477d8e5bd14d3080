//! Native filesystem adapter for arbor.
//!
//! This crate turns raw filesystem state into [`arbor_core::PathNode`]
//! trees: a blocking single-directory lister with cooperative
//! cancellation, a node factory probing entry attributes, block-device
//! enumeration behind the [`DriveSource`] trait, and discovery of the
//! OS roots shown under the tree root.
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor_core::{BrowseConfig, NodeAttrs, PathNode};
//! use arbor_fs::DirLister;
//! use tokio_util::sync::CancellationToken;
//!
//! let lister = DirLister::new(BrowseConfig::new());
//! let home = PathNode::regular("/home", NodeAttrs::directory(None), None);
//! let children = lister.list(&home, &CancellationToken::new()).unwrap();
//! println!("{} entries", children.len());
//! ```

mod drives;
mod factory;
mod lister;
mod roots;

pub use drives::{flatten_records, parse_lsblk, DriveError, DriveRecord, DriveSource, LsblkSource};
pub use factory::{drive_node, node_from_path};
pub use lister::DirLister;
pub use roots::{home_dir, os_roots, root_children};

// Re-export core types for convenience
pub use arbor_core::{BrowseConfig, DriveInfo, DriveKind, ListError, NodeAttrs, PathNode, Transport};
