//! Embedded Structured Store
//!
//! SQLite-backed storage, either in `<dir>/.cache.sqlite` or fully in memory.
//! Every statement runs as its own transaction. Rows are scoped by the
//! callable's namespace so several memoized callables can share one file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::{CacheError, Result};
use crate::store::Backend;

/// File name of the database inside the configured directory.
pub const SQLITE_FILE_NAME: &str = ".cache.sqlite";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_SQL: &str = "CREATE TABLE IF NOT EXISTS kv (
    ns TEXT NOT NULL,
    k TEXT NOT NULL,
    v BLOB NOT NULL,
    PRIMARY KEY (ns, k)
)";
const GET_SQL: &str = "SELECT v FROM kv WHERE ns = ?1 AND k = ?2";
const SET_SQL: &str = "INSERT OR REPLACE INTO kv (ns, k, v) VALUES (?1, ?2, ?3)";
const DEL_SQL: &str = "DELETE FROM kv WHERE ns = ?1 AND k = ?2";
const CLEAR_SQL: &str = "DELETE FROM kv WHERE ns = ?1";
const KEYS_SQL: &str = "SELECT k FROM kv WHERE ns = ?1 ORDER BY k";
const LEN_SQL: &str = "SELECT COUNT(*) FROM kv WHERE ns = ?1";

// == SQLite Store ==
/// SQLite-backed store for one callable namespace.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    namespace: String,
    /// `None` for in-memory databases
    path: Option<PathBuf>,
}

impl SqliteStore {
    // == Constructors ==
    /// Opens (creating if needed) `<dir>/.cache.sqlite`.
    ///
    /// # Errors
    /// [`CacheError::StoreUnavailable`] if the directory cannot be created or
    /// the existing file is not a readable SQLite database. Existing data is
    /// never discarded.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            CacheError::StoreUnavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(SQLITE_FILE_NAME);
        let conn = Connection::open(&path).map_err(|e| {
            CacheError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self::init(conn, namespace, Some(path))?;
        info!(path = ?store.path, namespace, "SQLite cache opened");
        Ok(store)
    }

    /// Opens a private `:memory:` database that never touches disk.
    pub fn in_memory(namespace: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self::init(conn, namespace, None)?;
        debug!(namespace, "In-memory SQLite cache opened");
        Ok(store)
    }

    fn init(conn: Connection, namespace: &str, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(CREATE_SQL).map_err(|e| {
            CacheError::StoreUnavailable(format!("cannot initialize cache table: {}", e))
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.to_string(),
            path,
        })
    }

    /// Database file, or `None` when running in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl<V> Backend<V> for SqliteStore
where
    V: Serialize + DeserializeOwned,
{
    // == Get ==
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(GET_SQL, params![self.namespace, key.as_str()], |row| {
                row.get(0)
            })
            .optional()?;

        bytes.map(|b| CacheEntry::from_bytes(&b)).transpose()
    }

    // == Set ==
    fn set(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<()> {
        let bytes = entry.to_bytes()?;
        self.conn
            .lock()
            .execute(SET_SQL, params![self.namespace, key.as_str(), bytes])?;
        Ok(())
    }

    // == Delete ==
    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.conn
            .lock()
            .execute(DEL_SQL, params![self.namespace, key.as_str()])?;
        Ok(())
    }

    // == Clear ==
    fn clear(&self) -> Result<()> {
        let removed = self.conn.lock().execute(CLEAR_SQL, params![self.namespace])?;
        info!(namespace = %self.namespace, removed, "SQLite cache cleared");
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(KEYS_SQL)?;
        let rows = stmt.query_map(params![self.namespace], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            if let Some(key) = CacheKey::from_hex(&row?) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row(LEN_SQL, params![self.namespace], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{derive, CallableId};
    use tempfile::TempDir;

    fn key(n: u32) -> CacheKey {
        derive(&CallableId::new("sqlite::tests", "f"), &(n,), &()).unwrap()
    }

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), "ns").unwrap();

        assert_eq!(store.path(), Some(dir.path().join(SQLITE_FILE_NAME).as_path()));
        assert!(dir.path().join(SQLITE_FILE_NAME).exists());
    }

    #[test]
    fn test_open_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = SqliteStore::open(&nested, "ns").unwrap();
        Backend::<String>::set(&store, &key(1), &CacheEntry::new("x".into())).unwrap();

        assert!(nested.join(SQLITE_FILE_NAME).exists());
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let entry = CacheEntry::new("persisted".to_string());
        {
            let store = SqliteStore::open(dir.path(), "ns").unwrap();
            store.set(&key(1), &entry).unwrap();
        }

        let store = SqliteStore::open(dir.path(), "ns").unwrap();
        let loaded = Backend::<String>::get(&store, &key(1)).unwrap().unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let dir = TempDir::new().unwrap();
        let first = SqliteStore::open(dir.path(), "first").unwrap();
        let second = SqliteStore::open(dir.path(), "second").unwrap();

        first.set(&key(1), &CacheEntry::new(1u8)).unwrap();
        second.set(&key(1), &CacheEntry::new(2u8)).unwrap();
        second.set(&key(2), &CacheEntry::new(3u8)).unwrap();

        assert_eq!(Backend::<u8>::len(&first).unwrap(), 1);
        assert_eq!(Backend::<u8>::len(&second).unwrap(), 2);

        Backend::<u8>::clear(&second).unwrap();
        let survivor = Backend::<u8>::get(&first, &key(1)).unwrap().unwrap();
        assert_eq!(survivor.value, 1);
        assert_eq!(Backend::<u8>::len(&second).unwrap(), 0);
    }

    #[test]
    fn test_two_connections_write_concurrently() {
        let dir = TempDir::new().unwrap();
        let first = SqliteStore::open(dir.path(), "first").unwrap();
        let second = SqliteStore::open(dir.path(), "second").unwrap();

        std::thread::scope(|scope| {
            for store in [&first, &second] {
                scope.spawn(move || {
                    for n in 0..50u32 {
                        store.set(&key(n), &CacheEntry::new(n)).unwrap();
                        let loaded = Backend::<u32>::get(store, &key(n)).unwrap().unwrap();
                        assert_eq!(loaded.value, n);
                    }
                });
            }
        });

        assert_eq!(Backend::<u32>::len(&first).unwrap(), 50);
        assert_eq!(Backend::<u32>::len(&second).unwrap(), 50);
    }

    #[test]
    fn test_in_memory_never_touches_disk() {
        let dir = TempDir::new().unwrap();
        let config = crate::config::BackendConfig::Sqlite {
            dir: dir.path().to_path_buf(),
            in_memory: true,
        };
        let id = CallableId::new("sqlite::tests", "f");
        let store: crate::store::Store<u32> = crate::store::Store::open(&config, &id).unwrap();

        store.set(&key(1), &CacheEntry::new(5)).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SQLITE_FILE_NAME), vec![0x42u8; 4096]).unwrap();

        let result = SqliteStore::open(dir.path(), "ns");
        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));

        // The corrupt file is left in place
        assert!(dir.path().join(SQLITE_FILE_NAME).exists());
    }

    #[test]
    fn test_undecodable_row_is_deserialization_error() {
        let store = SqliteStore::in_memory("ns").unwrap();
        store
            .conn
            .lock()
            .execute(SET_SQL, params!["ns", key(1).as_str(), vec![1u8, 2, 3]])
            .unwrap();

        let result = Backend::<String>::get(&store, &key(1));
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }
}
