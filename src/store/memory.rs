//! Volatile Map Store
//!
//! HashMap storage held in process memory. Entries are kept as-is, with no
//! serialization, and vanish when the process exits.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::cache::{CacheEntry, CacheKey};
use crate::error::Result;
use crate::store::Backend;

// == Memory Store ==
/// In-process key/entry map guarded by a read-write lock.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
}

impl<V> MemoryStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Backend<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    // == Get ==
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    // == Set ==
    /// Overwrites any previous entry; concurrent writers resolve last-writer-wins.
    fn set(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<()> {
        self.entries.write().insert(key.clone(), entry.clone());
        Ok(())
    }

    // == Delete ==
    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    // == Clear ==
    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}
