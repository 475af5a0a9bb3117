//! Storage Backends
//!
//! One get/set/delete/clear contract, three implementations:
//! - [`MemoryStore`]: process-local map, values kept as-is
//! - [`SqliteStore`]: embedded SQLite, file-backed or `:memory:`
//! - [`BlobStore`]: one gzip-compressed bincode file per key
//!
//! Backends know nothing about TTLs. A missing key is `Ok(None)`, never an
//! error.

mod blob;
mod memory;
mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEntry, CacheKey, CallableId};
use crate::config::BackendConfig;
use crate::error::{CacheError, Result};

pub use blob::BlobStore;
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SQLITE_FILE_NAME};

// == Backend Trait ==
/// Storage contract shared by every backend.
///
/// Implementations must tolerate concurrent calls from several threads.
pub trait Backend<V>: Send + Sync {
    /// Returns the entry for `key`, or `None` if nothing is stored.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>>;

    /// Stores `entry`, replacing whatever was there.
    fn set(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<()>;

    /// Removes `key`; removing an absent key is not an error.
    fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Removes every entry owned by this backend instance.
    fn clear(&self) -> Result<()>;

    /// Keys currently stored.
    fn keys(&self) -> Result<Vec<CacheKey>>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// == Store ==
/// Closed set of backends selectable through [`BackendConfig`].
pub enum Store<V> {
    Memory(MemoryStore<V>),
    Sqlite(SqliteStore),
    Blob(BlobStore),
    /// A backend that failed to open; every operation reports the reason
    Unavailable(String),
}

impl<V> Store<V> {
    /// Opens the backend described by `config`, scoped to callable `id`.
    ///
    /// # Errors
    /// [`CacheError::StoreUnavailable`](crate::CacheError::StoreUnavailable)
    /// when the directory or database cannot be prepared.
    pub fn open(config: &BackendConfig, id: &CallableId) -> Result<Self> {
        let store = match config {
            BackendConfig::Memory => Store::Memory(MemoryStore::new()),
            BackendConfig::Sqlite { in_memory: true, .. } => {
                Store::Sqlite(SqliteStore::in_memory(id.namespace())?)
            }
            BackendConfig::Sqlite { dir, .. } => {
                Store::Sqlite(SqliteStore::open(dir, id.namespace())?)
            }
            BackendConfig::Blob { dir } => Store::Blob(BlobStore::open(dir, id.namespace())?),
        };
        Ok(store)
    }

    /// Short backend name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
            Store::Blob(_) => "blob",
            Store::Unavailable(_) => "unavailable",
        }
    }
}

fn unavailable(reason: &str) -> CacheError {
    CacheError::StoreUnavailable(reason.to_string())
}

impl<V> Backend<V> for Store<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        match self {
            Store::Memory(store) => Backend::<V>::get(store, key),
            Store::Sqlite(store) => Backend::<V>::get(store, key),
            Store::Blob(store) => Backend::<V>::get(store, key),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    fn set(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<()> {
        match self {
            Store::Memory(store) => Backend::<V>::set(store, key, entry),
            Store::Sqlite(store) => Backend::<V>::set(store, key, entry),
            Store::Blob(store) => Backend::<V>::set(store, key, entry),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        match self {
            Store::Memory(store) => Backend::<V>::delete(store, key),
            Store::Sqlite(store) => Backend::<V>::delete(store, key),
            Store::Blob(store) => Backend::<V>::delete(store, key),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    fn clear(&self) -> Result<()> {
        match self {
            Store::Memory(store) => Backend::<V>::clear(store),
            Store::Sqlite(store) => Backend::<V>::clear(store),
            Store::Blob(store) => Backend::<V>::clear(store),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        match self {
            Store::Memory(store) => Backend::<V>::keys(store),
            Store::Sqlite(store) => Backend::<V>::keys(store),
            Store::Blob(store) => Backend::<V>::keys(store),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    fn len(&self) -> Result<usize> {
        match self {
            Store::Memory(store) => Backend::<V>::len(store),
            Store::Sqlite(store) => Backend::<V>::len(store),
            Store::Blob(store) => Backend::<V>::len(store),
            Store::Unavailable(reason) => Err(unavailable(reason)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn all_stores(dir: &TempDir) -> Vec<Store<Vec<u32>>> {
        let id = CallableId::new("store::tests", "numbers");
        vec![
            Store::open(&BackendConfig::Memory, &id).unwrap(),
            Store::open(&BackendConfig::sqlite_in_memory(), &id).unwrap(),
            Store::open(&BackendConfig::sqlite(dir.path()), &id).unwrap(),
            Store::open(&BackendConfig::blob(dir.path()), &id).unwrap(),
        ]
    }

    fn key(n: u32) -> CacheKey {
        crate::cache::derive(&CallableId::new("store::tests", "numbers"), &(n,), &()).unwrap()
    }

    #[test]
    fn test_open_selects_variant() {
        let dir = TempDir::new().unwrap();
        let kinds: Vec<&str> = all_stores(&dir).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec!["memory", "sqlite", "sqlite", "blob"]);
    }

    #[test]
    fn test_every_backend_round_trips() {
        let dir = TempDir::new().unwrap();
        for store in all_stores(&dir) {
            let entry = CacheEntry::new(vec![1, 2, 3]);
            store.set(&key(1), &entry).unwrap();

            let loaded = store.get(&key(1)).unwrap().unwrap();
            assert_eq!(loaded.value, vec![1, 2, 3], "backend {}", store.kind());
            assert_eq!(loaded.created_at, entry.created_at);
        }
    }

    #[test]
    fn test_every_backend_reports_absent() {
        let dir = TempDir::new().unwrap();
        for store in all_stores(&dir) {
            assert!(store.get(&key(99)).unwrap().is_none(), "backend {}", store.kind());
        }
    }

    #[test]
    fn test_every_backend_delete_and_clear() {
        let dir = TempDir::new().unwrap();
        for store in all_stores(&dir) {
            store.set(&key(1), &CacheEntry::new(vec![1])).unwrap();
            store.set(&key(2), &CacheEntry::new(vec![2])).unwrap();
            assert_eq!(store.len().unwrap(), 2, "backend {}", store.kind());

            store.delete(&key(1)).unwrap();
            store.delete(&key(1)).unwrap();
            assert!(store.get(&key(1)).unwrap().is_none());
            assert_eq!(store.keys().unwrap(), vec![key(2)]);

            store.clear().unwrap();
            assert!(store.is_empty().unwrap(), "backend {}", store.kind());
        }
    }

    #[test]
    fn test_unavailable_store_reports_every_operation() {
        let store: Store<Vec<u32>> = Store::Unavailable("corrupt file".into());

        assert_eq!(store.kind(), "unavailable");
        assert!(matches!(store.get(&key(1)), Err(CacheError::StoreUnavailable(_))));
        assert!(store.set(&key(1), &CacheEntry::new(vec![1])).is_err());
        assert!(store.delete(&key(1)).is_err());
        assert!(store.clear().is_err());
        assert!(store.keys().is_err());
        let err = store.len().unwrap_err();
        assert!(err.to_string().contains("corrupt file"));
    }

    #[test]
    fn test_every_backend_concurrent_writers() {
        const THREADS: u32 = 8;
        const ROUNDS: u32 = 25;

        let dir = TempDir::new().unwrap();
        for store in all_stores(&dir) {
            thread::scope(|scope| {
                for t in 0..THREADS {
                    let store = &store;
                    scope.spawn(move || {
                        let own = key(100 + t);
                        for round in 0..ROUNDS {
                            store.set(&key(0), &CacheEntry::new(vec![t; 16])).unwrap();
                            store.set(&own, &CacheEntry::new(vec![t, round])).unwrap();

                            // Whichever writer landed last, the entry is whole
                            let shared = store.get(&key(0)).unwrap().unwrap().value;
                            assert_eq!(shared.len(), 16);
                            assert!(shared.iter().all(|&x| x == shared[0]));

                            let mine = store.get(&own).unwrap().unwrap().value;
                            assert_eq!(mine, vec![t, round]);
                        }
                    });
                }
            });

            assert_eq!(store.len().unwrap(), THREADS as usize + 1, "backend {}", store.kind());
            for t in 0..THREADS {
                let last = store.get(&key(100 + t)).unwrap().unwrap().value;
                assert_eq!(last, vec![t, ROUNDS - 1], "backend {}", store.kind());
            }
            store.clear().unwrap();
        }
    }

    #[test]
    fn test_every_backend_overwrites() {
        let dir = TempDir::new().unwrap();
        for store in all_stores(&dir) {
            store.set(&key(1), &CacheEntry::new(vec![1])).unwrap();
            store.set(&key(1), &CacheEntry::new(vec![9, 9])).unwrap();

            assert_eq!(store.get(&key(1)).unwrap().unwrap().value, vec![9, 9]);
            assert_eq!(store.len().unwrap(), 1);
        }
    }
}
