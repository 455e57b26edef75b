//! Directory traversal engine for hoard.
//!
//! This crate walks a directory tree without recursion and records every
//! unique filesystem object in a [`Catalog`].
//!
//! # Overview
//!
//! `hoard-scan` keeps an explicit [`TraversalStack`] of open directories, so
//! the depth of a tree is bounded by heap rather than call stack. Key
//! features:
//!
//! - **Descriptor-relative lookups** via `openat`/`fstatat`
//! - **Hardlink deduplication** keyed by device and inode
//! - **Permission-denied entries** recorded as warnings, not failures
//! - **Cooperative cancellation** via [`CancellationToken`]
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use hoard_scan::{IndexConfig, Traverser};
//!
//! let traverser = Traverser::new(IndexConfig::new("/path/to/index"));
//! let (catalog, outcome) = traverser.index().unwrap();
//!
//! println!("Cataloged {} objects", catalog.len());
//! println!("Skipped {} entries", outcome.warnings.len());
//! ```
//!
//! # Lower level
//!
//! ```rust,no_run
//! use hoard_scan::{Catalog, CancellationToken, OpenFlags, traverse};
//!
//! let mut catalog = Catalog::new(4099).unwrap();
//! let cancel = CancellationToken::new();
//! traverse("/srv/data", &mut catalog, OpenFlags::NO_FOLLOW, &cancel).unwrap();
//! ```

#[cfg(not(unix))]
compile_error!("hoard-scan requires a Unix platform");

mod flags;
mod progress;
mod stack;
mod sys;
mod traverse;

pub use flags::OpenFlags;
pub use progress::{IndexProgress, next_progress};
pub use stack::{DirFrame, TraversalStack, path_concat};
pub use traverse::{
    Step, TraverseOutcome, Traverser, search_current_directory, traverse, traverse_into,
};
pub use tokio_util::sync::CancellationToken;

// Re-export core types for convenience
pub use hoard_core::{
    Catalog, FileKey, FileKind, FileRecord, IndexConfig, RecordId, Severity, Status, StatusCode,
};
