//! Cache Entry Module
//!
//! Defines the value/timestamp pair stored for every cache key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// A computed result together with the moment it was stored.
///
/// Entries carry no TTL of their own; validity is decided by the wrapper's
/// [`TtlPolicy`](crate::cache::TtlPolicy), so every backend stays TTL-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was computed
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: V) -> Self {
        Self::with_timestamp(value, Utc::now())
    }

    /// Creates an entry with an explicit creation time.
    pub fn with_timestamp(value: V, created_at: DateTime<Utc>) -> Self {
        Self { value, created_at }
    }

    // == Age ==
    /// Time elapsed between creation and `now`, clamped at zero.
    ///
    /// A clock that stepped backwards yields a zero age rather than an error.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Consumes the entry and returns the value.
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: Serialize> CacheEntry<V> {
    // == Encode ==
    /// Serializes the entry with bincode for the persistent backends.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CacheError::StoreUnavailable(e.to_string()))
    }
}

impl<V: for<'de> Deserialize<'de>> CacheEntry<V> {
    // == Decode ==
    /// Decodes an entry produced by [`CacheEntry::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}
