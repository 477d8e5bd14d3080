//! Core types for arbor.
//!
//! This crate provides the fundamental data structures shared by the
//! arbor engine: path nodes with lazily populated children, the
//! load-state machine governing population, child ordering and
//! filtering hooks, and browse configuration.

mod config;
mod error;
mod node;
mod order;
mod state;

pub use config::{BrowseConfig, BrowseConfigBuilder};
pub use error::ListError;
pub use node::{DriveInfo, DriveKind, NodeAttrs, NodeKind, PathNode, Transport};
pub use order::{default_comparator, default_order, sort_children, NodeComparator, NodeFilter};
pub use state::LoadState;
