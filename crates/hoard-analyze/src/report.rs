//! Summary reports over a catalog.
//!
//! A report answers the questions asked before a backup: how many objects of
//! each kind were found, how many bytes they hold, which files are largest
//! and how deep the tree goes.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use hoard_core::{Catalog, FileKind, FileRecord};

/// Configuration for reports and listings.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ReportConfig {
    /// Number of largest regular files to report.
    #[builder(default = "10")]
    pub top_n: usize,

    /// Kinds included in listings. Empty means every kind.
    #[builder(default)]
    pub kinds: Vec<FileKind>,

    /// Traversal root; depths are measured below it when set.
    #[builder(default, setter(into, strip_option))]
    pub root: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            kinds: Vec::new(),
            root: None,
        }
    }
}

impl ReportConfig {
    /// Create a new config builder.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Whether listings include entries of `kind`.
    pub fn includes(&self, kind: FileKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Depth of `path` below the configured root.
    pub fn depth_of(&self, path: &Path) -> usize {
        match &self.root {
            Some(root) => path
                .strip_prefix(root)
                .map(|relative| relative.components().count())
                .unwrap_or_else(|_| path.components().count()),
            None => path.components().count(),
        }
    }
}

/// Count and bytes for one kind of object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: FileKind,
    pub count: u64,
    pub bytes: u64,
}

/// One of the largest regular files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Totals and highlights for a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogReport {
    /// Unique objects cataloged.
    pub total_entries: u64,
    /// Sum of the sizes of all cataloged objects.
    pub total_bytes: u64,
    /// Per-kind totals, for kinds that occur.
    pub by_kind: Vec<KindStats>,
    /// Largest regular files, biggest first.
    pub largest: Vec<LargestEntry>,
    /// Deepest path depth seen.
    pub max_depth: usize,
}

impl CatalogReport {
    /// Summarize `catalog`.
    pub fn from_catalog(catalog: &Catalog, config: &ReportConfig) -> Self {
        let mut by_kind: Vec<KindStats> = FileKind::iter()
            .map(|kind| KindStats {
                kind,
                count: 0,
                bytes: 0,
            })
            .collect();
        let mut total_bytes = 0u64;
        let mut max_depth = 0usize;

        for (_, record) in catalog.records() {
            let kind = record.kind();
            if let Some(stats) = by_kind.iter_mut().find(|s| s.kind == kind) {
                stats.count += 1;
                stats.bytes += record.size;
            }
            total_bytes += record.size;
            max_depth = max_depth.max(config.depth_of(&record.path));
        }
        by_kind.retain(|s| s.count > 0);

        let largest = catalog
            .records()
            .map(|(_, record)| record)
            .filter(|record| record.is_file())
            .sorted_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)))
            .take(config.top_n)
            .map(|record| LargestEntry {
                path: record.path.clone(),
                size: record.size,
            })
            .collect();

        tracing::debug!(entries = catalog.len(), total_bytes, "Built catalog report");

        Self {
            total_entries: catalog.len() as u64,
            total_bytes,
            by_kind,
            largest,
            max_depth,
        }
    }

    /// Totals for one kind, if any objects of that kind were cataloged.
    pub fn kind(&self, kind: FileKind) -> Option<&KindStats> {
        self.by_kind.iter().find(|s| s.kind == kind)
    }

    /// Number of regular files.
    pub fn file_count(&self) -> u64 {
        self.kind(FileKind::File).map_or(0, |s| s.count)
    }

    /// Number of directories.
    pub fn dir_count(&self) -> u64 {
        self.kind(FileKind::Directory).map_or(0, |s| s.count)
    }
}

/// One row of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub path: PathBuf,
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits.
    pub permissions: u32,
    pub device: u64,
    pub inode: u64,
}

impl ListingEntry {
    fn new(device: u64, inode: u64, record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            kind: record.kind(),
            size: record.size,
            permissions: record.permissions(),
            device,
            inode,
        }
    }
}

/// Catalog entries of the configured kinds, sorted by path.
pub fn listing(catalog: &Catalog, config: &ReportConfig) -> Vec<ListingEntry> {
    catalog
        .records()
        .filter(|(_, record)| config.includes(record.kind()))
        .map(|(key, record)| ListingEntry::new(key.device, key.inode, record))
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect()
}
