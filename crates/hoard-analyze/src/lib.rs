//! Reporting over hoard catalogs.
//!
//! This crate turns a [`Catalog`] into things a person or a backup stage can
//! read:
//!
//! - **Reports** - per-kind totals, largest files, tree depth
//! - **Listings** - cataloged entries filtered by kind, sorted by path
//!
//! ```rust,ignore
//! use hoard_analyze::{CatalogReport, ReportConfig, listing};
//! use hoard_scan::{IndexConfig, Traverser};
//!
//! let (catalog, _) = Traverser::new(IndexConfig::new("/srv/data")).index().unwrap();
//!
//! let report = CatalogReport::from_catalog(&catalog, &ReportConfig::default());
//! println!("{} files, {} bytes", report.file_count(), report.total_bytes);
//!
//! for entry in listing(&catalog, &ReportConfig::default()) {
//!     println!("{}", entry.path.display());
//! }
//! ```

mod report;

pub use report::{
    CatalogReport, KindStats, LargestEntry, ListingEntry, ReportConfig, ReportConfigBuilder,
    listing,
};

// Re-export core types
pub use hoard_core::{Catalog, FileKind, FileRecord};
