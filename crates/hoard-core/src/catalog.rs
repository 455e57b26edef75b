//! Deduplicated catalog of filesystem objects.

use std::ops::ControlFlow;

use crate::config::IndexConfig;
use crate::node::{FileKey, FileKeyHasher, FileRecord};
use crate::table::{HashTable, Insert, TableError};

/// Slot of a record in the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Catalog of unique filesystem objects keyed by device and inode.
///
/// The records arena owns every key/record pair; the table only maps a key
/// to its arena slot. Records are kept in discovery order.
#[derive(Debug)]
pub struct Catalog {
    table: HashTable<FileKey, RecordId, FileKeyHasher>,
    records: Vec<(FileKey, FileRecord)>,
}

impl Catalog {
    /// Create an empty catalog with at least `initial_capacity` buckets.
    pub fn new(initial_capacity: usize) -> Result<Self, TableError> {
        Ok(Self {
            table: HashTable::with_prime_capacity(initial_capacity, FileKeyHasher)?,
            records: Vec::new(),
        })
    }

    /// Create an empty catalog sized and tuned by `config`.
    pub fn from_config(config: &IndexConfig) -> Result<Self, TableError> {
        let table = HashTable::with_prime_capacity(config.initial_capacity, FileKeyHasher)?
            .with_policy(config.load_factor, config.growth_step);
        Ok(Self {
            table,
            records: Vec::new(),
        })
    }

    /// Number of cataloged objects.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if nothing has been cataloged.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Bucket count of the underlying table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// The underlying key table, for consumers that walk it directly.
    pub fn table(&self) -> &HashTable<FileKey, RecordId, FileKeyHasher> {
        &self.table
    }

    /// Look up the record for a key.
    pub fn lookup(&self, key: &FileKey) -> Option<&FileRecord> {
        let id = self.table.lookup(key)?;
        self.get(*id)
    }

    /// Check whether a key has been cataloged.
    pub fn contains(&self, key: &FileKey) -> bool {
        self.table.contains(key)
    }

    /// Record by arena slot.
    pub fn get(&self, id: RecordId) -> Option<&FileRecord> {
        self.records.get(id.0).map(|(_, record)| record)
    }

    /// Catalog `record` under `key` unless the key is already known.
    ///
    /// On [`Insert::AlreadyPresent`] the record is dropped and the existing
    /// one is kept.
    pub fn insert(&mut self, key: FileKey, record: FileRecord) -> Result<Insert, TableError> {
        self.records
            .try_reserve(1)
            .map_err(|_| TableError::Allocation)?;

        let id = RecordId(self.records.len());
        let outcome = self.table.insert(key, id)?;
        if outcome == Insert::Inserted {
            self.records.push((key, record));
        }
        Ok(outcome)
    }

    /// Grow the key table if its load factor has been reached.
    pub fn grow_if_needed(&mut self) -> Result<Option<usize>, TableError> {
        self.table.grow_if_needed()
    }

    /// Visit every entry in table order; see [`HashTable::for_each`].
    pub fn for_each<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&FileKey, &FileRecord) -> ControlFlow<()>,
    {
        self.table.for_each(|key, id| match self.get(*id) {
            Some(record) => visit(key, record),
            None => ControlFlow::Continue(()),
        })
    }

    /// Iterate records in discovery order.
    pub fn records(&self) -> impl Iterator<Item = (&FileKey, &FileRecord)> {
        self.records.iter().map(|(key, record)| (key, record))
    }

    /// Tear the catalog down, handing every key and record to the caller.
    ///
    /// This is the single sweep over the catalog's payloads; the key table is
    /// released afterwards.
    pub fn sweep(self) -> Vec<(FileKey, FileRecord)> {
        let Self { table, records } = self;
        tracing::debug!(entries = records.len(), buckets = table.capacity(), "Sweeping catalog");
        drop(table);
        records
    }
}
