//! Memo Cache - transparent memoization with TTL expiration
//!
//! Wraps any callable (free function, method, associated function or
//! closure) so repeated calls with the same arguments are answered from a
//! cache. Three interchangeable backends are provided: an in-process map, an
//! embedded SQLite database and a directory of compressed blob files.
//!
//! ```ignore
//! use memo_cache::{BackendConfig, CacheConfig, CallableId, Memoized};
//!
//! fn slow_square(x: u64) -> u64 { x * x }
//!
//! let square = Memoized::new(
//!     CallableId::of_fn(&slow_square),
//!     CacheConfig::new(BackendConfig::blob("/tmp/squares")),
//!     slow_square,
//! );
//! assert_eq!(square.call(12)?, 144);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheEntry, CacheKey, CacheStats, CallableId, Kwargs, Memoized, TtlPolicy};
pub use config::{BackendConfig, CacheConfig};
pub use error::{CacheError, Result};
pub use store::{Backend, BlobStore, MemoryStore, SqliteStore, Store};

/// Builds a [`CallableId`] named `name` inside the calling module.
///
/// ```ignore
/// let id = memo_cache::callable_id!("fetch_profile");
/// ```
#[macro_export]
macro_rules! callable_id {
    ($name:expr) => {
        $crate::CallableId::new(module_path!(), $name)
    };
}
