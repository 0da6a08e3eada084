//! The `Catalog` trait stands in for the B-tree engine collaborator
//! (§6: `search_slot`, `previous_item`, `next_leaf`, `insert_empty_item`,
//! `insert_item`, `item_key_to_cpu`, `item_ptr`, `release_path`,
//! `mark_buffer_dirty`). Implementing B-tree internals (splits, leaf
//! traversal, buffer dirtying) is an explicit non-goal of this layer, so
//! the trait exposes only the ordered-traversal operations the device
//! and chunk allocators actually need, and [`MemCatalog`] gives a
//! `BTreeMap`-backed reference implementation for tests and the
//! fixture-driven CLI commands.

use crate::error::{Result, VolumeError};
use std::collections::BTreeMap;

pub trait Catalog<K, V>
where
    K: Ord + Copy,
    V: Clone,
{
    /// Exact lookup.
    fn get(&self, key: &K) -> Option<V>;

    /// All entries with key >= `from`, in ascending order.
    /// Stands in for `search_slot` + repeated `next_leaf`.
    fn range_from(&self, from: &K) -> Vec<(K, V)>;

    /// The entry with the greatest key <= `at`, if any.
    /// Stands in for `search_slot` + `previous_item`.
    fn previous_or_equal(&self, at: &K) -> Option<(K, V)>;

    /// The entry with the greatest key in the catalog.
    fn highest(&self) -> Option<(K, V)>;

    /// Insert a new entry. Implementations that enforce a capacity
    /// (the sys-chunk array) return `Err` instead of panicking.
    fn insert(&mut self, key: K, value: V) -> Result<()>;

    /// Overwrite an existing entry. Fails with `NotFound` if absent.
    fn update(&mut self, key: K, value: V) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reference `Catalog` implementation backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct MemCatalog<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K, V> MemCatalog<K, V>
where
    K: Ord + Copy,
{
    pub fn new() -> Self {
        MemCatalog { entries: BTreeMap::new() }
    }
}

impl<K, V> Catalog<K, V> for MemCatalog<K, V>
where
    K: Ord + Copy,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn range_from(&self, from: &K) -> Vec<(K, V)> {
        self.entries
            .range(*from..)
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    fn previous_or_equal(&self, at: &K) -> Option<(K, V)> {
        self.entries
            .range(..=*at)
            .next_back()
            .map(|(k, v)| (*k, v.clone()))
    }

    fn highest(&self) -> Option<(K, V)> {
        self.entries.iter().next_back().map(|(k, v)| (*k, v.clone()))
    }

    fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn update(&mut self, key: K, value: V) -> Result<()> {
        if !self.entries.contains_key(&key) {
            return Err(VolumeError::NotFound(format!("{:?}", "catalog key")));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
