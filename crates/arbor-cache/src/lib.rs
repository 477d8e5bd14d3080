//! Preloading memoizer cache for arbor.
//!
//! The [`Preloader`] maps a path key to the single in-flight (or
//! completed) computation of that node's children. Concurrent callers
//! racing on the same key always receive handles to one computation;
//! `start` and `get` never block. Entries may carry a time budget and
//! are then evicted by a single lazily started reaper task.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() {
//! use arbor_cache::{LoadOutcome, Preloader};
//! use std::path::Path;
//!
//! let preloader = Preloader::new();
//! let handle = preloader.start(Path::new("/tmp"), |_cancel| Ok(Vec::new()));
//! match handle.join().await {
//!     LoadOutcome::Loaded(children) => println!("{} children", children.len()),
//!     LoadOutcome::Failed(err) => eprintln!("listing failed: {err}"),
//!     LoadOutcome::Canceled => {}
//! }
//! # }
//! ```

mod error;
mod handle;
mod preloader;
mod reaper;

pub use error::CacheError;
pub use handle::{LoadHandle, LoadOutcome};
pub use preloader::Preloader;
