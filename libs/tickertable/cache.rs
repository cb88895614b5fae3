//! Row/field index cache.
//!
//! Maps each visible key to its view row handle and per-field cell
//! handles so a field update is a direct handle write instead of a
//! search. Purely a performance index over the current render tree:
//! never a source of truth, always rebuildable from the visible key set.

use crate::model::{FieldName, Key};
use crate::render::{CellHandle, RowHandle};
use std::collections::HashMap;

/// Cached handles for one rendered row
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub row: RowHandle,
    pub cells: HashMap<FieldName, CellHandle>,
}

/// O(1) key -> handle index, populated lazily at first render of a key
#[derive(Debug, Default)]
pub struct HandleCache {
    entries: HashMap<Key, CacheEntry>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached handles for a key
    #[inline]
    pub fn get(&self, key: &Key) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Record the handles for a freshly rendered row
    pub fn insert(&mut self, key: Key, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Remove one key (the visible set rarely shrinks, but must be handled)
    pub fn remove(&mut self, key: &Key) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Wholesale invalidation. Idempotent; safe to call after any other
    /// component rebuilt the view.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
