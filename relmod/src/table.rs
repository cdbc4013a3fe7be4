//! Insertion-ordered tables with overwrite-on-duplicate semantics.
//!
//! Relocations and import references are keyed by fixup address and exports
//! by name. A later insert under an existing key replaces the value but keeps
//! the slot the key was first inserted in, so iteration order only depends on
//! the order entries appear in the stream.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashMap;

/// An insertion-ordered map.
#[derive(Debug, Clone)]
pub struct OrderedTable<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K: Hash + Eq + Clone, V> OrderedTable<K, V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert `value` under `key`.
    ///
    /// Returns the replaced value when `key` was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.index.get(&key) {
            Some(&slot) => Some(core::mem::replace(&mut self.entries[slot].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterate values in first-insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K: Hash + Eq + Clone, V> Default for OrderedTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
