//! Configuration Module
//!
//! Decoration-time settings for a memoized callable: TTL and backend choice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Which storage backend a memoized callable writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendConfig {
    /// In-process map, lost on exit
    #[default]
    Memory,
    /// Embedded SQLite database, either `:memory:` or `<dir>/.cache.sqlite`
    Sqlite { dir: PathBuf, in_memory: bool },
    /// One gzip-compressed file per key under `dir`
    Blob { dir: PathBuf },
}

impl BackendConfig {
    /// SQLite store persisted under `dir`.
    pub fn sqlite(dir: impl AsRef<Path>) -> Self {
        BackendConfig::Sqlite {
            dir: dir.as_ref().to_path_buf(),
            in_memory: false,
        }
    }

    /// SQLite store that never touches the filesystem.
    pub fn sqlite_in_memory() -> Self {
        BackendConfig::Sqlite {
            dir: default_dir(),
            in_memory: true,
        }
    }

    /// SQLite store persisted in the shared temporary directory.
    pub fn sqlite_default() -> Self {
        Self::sqlite(default_dir())
    }

    /// Blob file store under `dir`.
    pub fn blob(dir: impl AsRef<Path>) -> Self {
        BackendConfig::Blob {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Blob file store in the shared temporary directory.
    pub fn blob_default() -> Self {
        Self::blob(default_dir())
    }
}

/// Per-decoration configuration.
///
/// Consumed when the callable is wrapped; nothing here can change afterwards.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid after it was written
    pub ttl: Duration,
    /// Storage backend for this decoration
    pub backend: BackendConfig,
}

impl CacheConfig {
    /// Creates a config with the default TTL and the given backend.
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            ttl: DEFAULT_TTL,
            backend,
        }
    }

    /// Overrides the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Overrides the backend.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

/// Shared temporary directory used when no directory is given.
pub fn default_dir() -> PathBuf {
    std::env::temp_dir()
}
