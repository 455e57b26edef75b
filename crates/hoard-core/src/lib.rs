//! Core types for hoard.
//!
//! This crate provides the building blocks shared by the indexing and
//! reporting stages:
//!
//! - [`HashTable`], a chained hash table with prime-sized growth and a
//!   pluggable [`KeyHasher`]
//! - the [`prime`] helpers used for capacity planning
//! - [`FileKey`] / [`FileRecord`], the handoff types of the catalog
//! - [`Catalog`], the deduplicated inventory built by a traversal
//! - [`Status`], the structured result carried by every fallible call
//! - [`IndexConfig`]

mod catalog;
mod config;
mod node;
pub mod prime;
mod status;
pub mod table;

pub use catalog::{Catalog, RecordId};
pub use config::{IndexConfig, IndexConfigBuilder};
pub use node::{FileKey, FileKeyHasher, FileKind, FileRecord};
pub use status::{Severity, Status, StatusCode};
pub use table::{HashTable, Insert, KeyHasher, Remove, StdKeyHasher, TableError};
