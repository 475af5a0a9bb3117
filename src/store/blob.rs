//! Blob File Store
//!
//! One file per key: the entry is bincode-serialized, gzip-compressed and
//! written to `<dir>/.cache.<namespace>.<key>.gz`. Writes go to a temporary
//! file in the same directory that is then renamed over the target, so
//! readers only ever see whole files.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::{CacheError, Result};
use crate::store::Backend;

const FILE_PREFIX: &str = ".cache.";
const FILE_SUFFIX: &str = ".gz";

// == Blob Store ==
/// Directory of compressed per-key files for one callable namespace.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
    namespace: String,
}

impl BlobStore {
    // == Constructor ==
    /// Uses `dir` (created if missing) for this namespace's files.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            CacheError::StoreUnavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;
        debug!(dir = ?dir, namespace, "Blob cache opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            namespace: namespace.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic file path for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}{}",
            FILE_PREFIX, self.namespace, key, FILE_SUFFIX
        ))
    }

    /// Recovers the key from a file name belonging to this namespace.
    fn key_from_file_name(&self, name: &str) -> Option<CacheKey> {
        let rest = name.strip_prefix(FILE_PREFIX)?;
        let rest = rest.strip_prefix(self.namespace.as_str())?;
        let hex_key = rest.strip_prefix('.')?.strip_suffix(FILE_SUFFIX)?;
        CacheKey::from_hex(hex_key)
    }
}

impl<V> Backend<V> for BlobStore
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    // == Get ==
    /// Missing file is `Ok(None)`; a truncated or garbled file is
    /// [`CacheError::Deserialization`].
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::StoreUnavailable(format!(
                    "cannot open {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut bytes = Vec::new();
        GzDecoder::new(file).read_to_end(&mut bytes).map_err(|e| {
            CacheError::Deserialization(format!("cannot decompress {}: {}", path.display(), e))
        })?;

        CacheEntry::from_bytes(&bytes).map(Some)
    }

    // == Set ==
    fn set(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<()> {
        let bytes = entry.to_bytes()?;

        let tmp = NamedTempFile::new_in(&self.dir)?;
        let mut encoder = GzEncoder::new(tmp, Compression::default());
        encoder.write_all(&bytes)?;
        let tmp = encoder.finish()?;

        let path = self.path_for(key);
        tmp.persist(&path).map_err(|e| {
            CacheError::StoreUnavailable(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    // == Delete ==
    fn delete(&self, key: &CacheKey) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // == Clear ==
    fn clear(&self) -> Result<()> {
        let keys = Backend::<V>::keys(self)?;
        for key in &keys {
            Backend::<V>::delete(self, key)?;
        }
        info!(dir = ?self.dir, namespace = %self.namespace, removed = keys.len(), "Blob cache cleared");
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let listing = match fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for dir_entry in listing {
            let name = dir_entry?.file_name();
            if let Some(key) = name.to_str().and_then(|n| self.key_from_file_name(n)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
