//! Error types for the memoization engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for key derivation and storage.
///
/// Only [`CacheError::KeyDerivation`] ever reaches the caller of a memoized
/// callable. Storage failures are absorbed by the wrapper and turned into
/// cache misses.
#[derive(Error, Debug)]
pub enum CacheError {
    /// An argument has no deterministic serialized representation
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The backend could not be opened, read or written
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored entry could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
}

// == Conversions ==
impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::KeyDerivation(err.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::StoreUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::StoreUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Deserialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the memoization engine.
pub type Result<T> = std::result::Result<T, CacheError>;
