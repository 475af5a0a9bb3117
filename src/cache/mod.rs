//! Cache Module
//!
//! The memoization engine: key derivation, entries, TTL policy, statistics
//! and the memoizing wrapper. Storage lives in [`crate::store`].

mod entry;
mod finite;
mod key;
mod memoize;
mod stats;
mod ttl;


use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub use key::{canonical_bytes, derive, CacheKey, CallableId, Kwargs};
pub use memoize::Memoized;
pub use stats::CacheStats;
pub use ttl::TtlPolicy;

// == Public Constants ==
/// TTL applied when a decoration does not set one
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
