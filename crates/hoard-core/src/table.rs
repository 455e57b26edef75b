//! Chained hash table with prime-sized capacity growth.
//!
//! The table stores keys and values as caller-chosen handles. It never owns
//! the payload a handle refers to: for the file catalog the keys are small
//! `Copy` identities and the values are indices into an arena owned by
//! [`Catalog`](crate::Catalog), which is responsible for releasing them.
//!
//! Collisions are resolved by separate chaining with head insertion. Chains
//! are linked by index inside a single entry slab, so a resize only rebuilds
//! the bucket heads and relinks entries; no entry is copied or moved.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;

use thiserror::Error;

use crate::prime::{next_nth_prime, next_prime_at_least};

/// Default ratio of entries to buckets that triggers a resize.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Default number of primes to skip when growing.
///
/// A resize targets the n-th prime above twice the current capacity, which
/// trades a slightly longer prime search for fewer rehash passes.
pub const DEFAULT_GROWTH_STEP: usize = 10;

/// Hash and equality capability supplied when a table is created.
pub trait KeyHasher<K> {
    /// Hash a key.
    fn hash(&self, key: &K) -> u64;

    /// Check whether two keys are the same entry.
    fn eq(&self, a: &K, b: &K) -> bool;
}

/// [`KeyHasher`] for any key implementing `Hash + Eq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdKeyHasher;

impl<K: Hash + Eq> KeyHasher<K> for StdKeyHasher {
    fn hash(&self, key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Errors returned by table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    /// Bucket or entry storage could not be allocated.
    #[error("could not allocate table storage")]
    Allocation,

    /// The table was created with zero buckets and cannot store entries.
    #[error("table has no buckets")]
    NoBuckets,

    /// A rehash to zero buckets was requested.
    #[error("cannot rehash to zero buckets")]
    ZeroCapacity,

    /// Planning the next capacity overflowed.
    #[error("capacity overflow while growing from {capacity} buckets")]
    CapacityOverflow { capacity: usize },
}

/// Outcome of a successful [`HashTable::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// The entry was added.
    Inserted,
    /// An equal key was already stored; nothing changed.
    AlreadyPresent,
}

/// Outcome of [`HashTable::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remove<K, V> {
    /// The entry was unlinked; its handles are handed back.
    Removed { key: K, value: V },
    /// No entry matched.
    NotFound,
}

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    next: Option<usize>,
}

#[derive(Debug)]
enum Node<K, V> {
    Occupied(Slot<K, V>),
    Vacant { next_free: Option<usize> },
}

/// Generic chained hash table.
pub struct HashTable<K, V, H = StdKeyHasher> {
    buckets: Vec<Option<usize>>,
    nodes: Vec<Node<K, V>>,
    free: Option<usize>,
    len: usize,
    hasher: H,
    load_factor: f64,
    growth_step: usize,
}

impl<K, V, H: KeyHasher<K>> HashTable<K, V, H> {
    /// Create a table with exactly `capacity` buckets.
    ///
    /// The capacity is used as given; pass a prime, or use
    /// [`with_prime_capacity`](Self::with_prime_capacity). A zero-capacity
    /// table is valid but rejects every insert.
    pub fn with_capacity(capacity: usize, hasher: H) -> Result<Self, TableError> {
        Ok(Self {
            buckets: alloc_buckets(capacity)?,
            nodes: Vec::new(),
            free: None,
            len: 0,
            hasher,
            load_factor: DEFAULT_LOAD_FACTOR,
            growth_step: DEFAULT_GROWTH_STEP,
        })
    }

    /// Create a table whose capacity is the smallest prime `>= min_capacity`.
    pub fn with_prime_capacity(min_capacity: usize, hasher: H) -> Result<Self, TableError> {
        let capacity = next_prime_at_least(min_capacity)
            .map_err(|_| TableError::CapacityOverflow { capacity: min_capacity })?;
        Self::with_capacity(capacity, hasher)
    }

    /// Set the load factor threshold and growth step used by the resize policy.
    ///
    /// A load factor outside `(0, 1]` falls back to [`DEFAULT_LOAD_FACTOR`]; a
    /// growth step of zero becomes one.
    pub fn with_policy(mut self, load_factor: f64, growth_step: usize) -> Self {
        self.load_factor = if load_factor > 0.0 && load_factor <= 1.0 {
            load_factor
        } else {
            tracing::warn!(load_factor, "Load factor out of range, using default");
            DEFAULT_LOAD_FACTOR
        };
        self.growth_step = growth_step.max(1);
        self
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table stores no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current ratio of entries to buckets.
    pub fn load(&self) -> f64 {
        if self.buckets.is_empty() {
            f64::INFINITY
        } else {
            self.len as f64 / self.buckets.len() as f64
        }
    }

    /// Configured load factor threshold.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Configured growth step.
    pub fn growth_step(&self) -> usize {
        self.growth_step
    }

    /// Look up the value stored for `key`.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        let bucket = self.bucket_of(key)?;
        let idx = self.find_in(bucket, key)?;
        self.slot(idx).map(|slot| &slot.value)
    }

    /// Check whether `key` is stored.
    pub fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Insert `key` with `value` unless an equal key is already stored.
    pub fn insert(&mut self, key: K, value: V) -> Result<Insert, TableError> {
        let bucket = self.bucket_of(&key).ok_or(TableError::NoBuckets)?;
        if self.find_in(bucket, &key).is_some() {
            return Ok(Insert::AlreadyPresent);
        }

        let slot = Slot {
            key,
            value,
            next: self.buckets[bucket],
        };

        let idx = match self.free {
            Some(idx) => {
                self.free = match &self.nodes[idx] {
                    Node::Vacant { next_free } => *next_free,
                    Node::Occupied(_) => None,
                };
                self.nodes[idx] = Node::Occupied(slot);
                idx
            }
            None => {
                self.nodes
                    .try_reserve(1)
                    .map_err(|_| TableError::Allocation)?;
                self.nodes.push(Node::Occupied(slot));
                self.nodes.len() - 1
            }
        };

        self.buckets[bucket] = Some(idx);
        self.len += 1;
        Ok(Insert::Inserted)
    }

    /// Unlink the entry for `key`.
    pub fn remove(&mut self, key: &K) -> Remove<K, V> {
        let Some(bucket) = self.bucket_of(key) else {
            return Remove::NotFound;
        };

        let mut prev: Option<usize> = None;
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            let Some(slot) = self.slot(idx) else {
                break;
            };
            let next = slot.next;

            if self.hasher.eq(&slot.key, key) {
                match prev {
                    Some(p) => {
                        if let Node::Occupied(prev_slot) = &mut self.nodes[p] {
                            prev_slot.next = next;
                        }
                    }
                    None => self.buckets[bucket] = next,
                }

                let node = std::mem::replace(
                    &mut self.nodes[idx],
                    Node::Vacant {
                        next_free: self.free,
                    },
                );
                self.free = Some(idx);
                self.len -= 1;

                return match node {
                    Node::Occupied(slot) => Remove::Removed {
                        key: slot.key,
                        value: slot.value,
                    },
                    Node::Vacant { .. } => Remove::NotFound,
                };
            }

            prev = Some(idx);
            cursor = next;
        }

        Remove::NotFound
    }

    /// Visit every entry in bucket order.
    ///
    /// The visitor returns [`ControlFlow::Break`] to stop early. Returns the
    /// number of entries visited before the walk ended; the entry that asked
    /// to stop is not counted.
    pub fn for_each<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let mut seen = 0;
        for (key, value) in self.iter() {
            if visit(key, value).is_break() {
                return seen;
            }
            seen += 1;
        }
        seen
    }

    /// Iterate over entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V, H> {
        Iter {
            table: self,
            bucket: 0,
            cursor: None,
        }
    }

    /// Return the capacity the table should grow to, or 0 if no growth is needed.
    ///
    /// Growth is due once `len / capacity` reaches the load factor. The target
    /// is the `growth_step`-th prime above twice the current capacity.
    pub fn check_resize_needed(&self) -> Result<usize, TableError> {
        if self.load() < self.load_factor {
            return Ok(0);
        }

        let capacity = self.capacity();
        let doubled = capacity
            .checked_mul(2)
            .ok_or(TableError::CapacityOverflow { capacity })?;
        next_nth_prime(doubled, self.growth_step)
            .map_err(|_| TableError::CapacityOverflow { capacity })
    }

    /// Relink every entry into `new_capacity` freshly allocated buckets.
    ///
    /// On failure the table is left exactly as it was.
    pub fn rehash(&mut self, new_capacity: usize) -> Result<(), TableError> {
        if new_capacity == 0 {
            return Err(TableError::ZeroCapacity);
        }
        let mut buckets = alloc_buckets(new_capacity)?;

        for head in 0..self.buckets.len() {
            let mut cursor = self.buckets[head];
            while let Some(idx) = cursor {
                let Node::Occupied(slot) = &mut self.nodes[idx] else {
                    break;
                };
                cursor = slot.next;

                let target = (self.hasher.hash(&slot.key) % new_capacity as u64) as usize;
                slot.next = buckets[target];
                buckets[target] = Some(idx);
            }
        }

        self.buckets = buckets;
        Ok(())
    }

    /// Grow the table if the load factor has been reached.
    ///
    /// Returns the new capacity when a resize happened.
    pub fn grow_if_needed(&mut self) -> Result<Option<usize>, TableError> {
        let target = self.check_resize_needed()?;
        if target <= self.capacity() {
            return Ok(None);
        }

        let from = self.capacity();
        self.rehash(target)?;
        tracing::debug!(from, to = target, entries = self.len, "Resized hash table");
        Ok(Some(target))
    }

    fn bucket_of(&self, key: &K) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        Some((self.hasher.hash(key) % self.buckets.len() as u64) as usize)
    }

    fn find_in(&self, bucket: usize, key: &K) -> Option<usize> {
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            let slot = self.slot(idx)?;
            if self.hasher.eq(&slot.key, key) {
                return Some(idx);
            }
            cursor = slot.next;
        }
        None
    }

    fn slot(&self, idx: usize) -> Option<&Slot<K, V>> {
        match self.nodes.get(idx) {
            Some(Node::Occupied(slot)) => Some(slot),
            _ => None,
        }
    }
}

impl<K, V, H> fmt::Debug for HashTable<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("capacity", &self.buckets.len())
            .field("len", &self.len)
            .field("load_factor", &self.load_factor)
            .field("growth_step", &self.growth_step)
            .finish()
    }
}

fn alloc_buckets(capacity: usize) -> Result<Vec<Option<usize>>, TableError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|_| TableError::Allocation)?;
    buckets.resize(capacity, None);
    Ok(buckets)
}

/// Iterator over table entries in bucket order.
pub struct Iter<'a, K, V, H> {
    table: &'a HashTable<K, V, H>,
    bucket: usize,
    cursor: Option<usize>,
}

impl<'a, K, V, H: KeyHasher<K>> Iterator for Iter<'a, K, V, H> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(idx) = self.cursor {
                let slot = self.table.slot(idx)?;
                self.cursor = slot.next;
                return Some((&slot.key, &slot.value));
            }

            let head = self.table.buckets.get(self.bucket)?;
            self.bucket += 1;
            self.cursor = *head;
        }
    }
}

impl<'a, K, V, H: KeyHasher<K>> IntoIterator for &'a HashTable<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
