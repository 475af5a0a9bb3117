//! Memoizing Wrapper
//!
//! Wraps a callable so each call goes through key derivation, a backend
//! lookup gated by the TTL policy, and a write-back on miss.
//!
//! Per-call flow:
//! 1. Derive the key from the callable identity and the arguments
//! 2. Look the key up; a fresh entry is returned without running the callable
//! 3. Otherwise run the callable once, store the result, return it
//!
//! Storage failures never reach the caller: they are logged and handled as
//! misses. Key derivation failures do reach the caller, and the callable is
//! not run.

use std::marker::PhantomData;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{derive, CacheEntry, CacheKey, CacheStats, CallableId, TtlPolicy};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::store::{Backend, Store};

// == Memoized ==
/// A callable with a private cache in front of it.
///
/// `F` is the wrapped callable, `V` its result type and `B` the backend,
/// which defaults to the config-selected [`Store`].
///
/// Instance methods are memoized by passing the receiver as the first
/// positional argument; it then takes part in the key like any other value.
///
/// # Example
/// ```ignore
/// let square = Memoized::new(CallableId::of_fn(&square), CacheConfig::default(), square);
/// assert_eq!(square.call(4)?, 16);
/// ```
pub struct Memoized<F, V, B = Store<V>> {
    id: CallableId,
    func: F,
    backend: B,
    policy: TtlPolicy,
    stats: Mutex<CacheStats>,
    _value: PhantomData<fn() -> V>,
}

impl<F, V> Memoized<F, V, Store<V>>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    // == Constructor ==
    /// Wraps `func`, opening the backend described by `config`.
    ///
    /// An on-disk backend that cannot be opened (unwritable directory,
    /// corrupt database file) is logged and replaced by
    /// [`Store::Unavailable`]: every call then runs `func` uncached and the
    /// files on disk are left untouched.
    pub fn new(id: CallableId, config: CacheConfig, func: F) -> Self {
        let backend = Store::open(&config.backend, &id).unwrap_or_else(|e| {
            warn!(
                callable = %id,
                error = %e,
                "Cache backend unavailable, calls will not be cached"
            );
            Store::Unavailable(e.to_string())
        });
        info!(
            callable = %id,
            backend = backend.kind(),
            ttl_secs = config.ttl.as_secs_f64(),
            "Memoized callable registered"
        );
        Self::with_backend(id, config.ttl, backend, func)
    }
}

impl<F, V, B> Memoized<F, V, B>
where
    B: Backend<V>,
{
    /// Wraps `func` around an already constructed backend.
    pub fn with_backend(id: CallableId, ttl: Duration, backend: B, func: F) -> Self {
        Self {
            id,
            func,
            backend,
            policy: TtlPolicy::new(ttl),
            stats: Mutex::new(CacheStats::new()),
            _value: PhantomData,
        }
    }

    pub fn id(&self) -> &CallableId {
        &self.id
    }

    pub fn ttl(&self) -> Duration {
        self.policy.ttl()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Key a call with these arguments would use.
    pub fn key_for<P, K>(&self, positional: &P, keyword: &K) -> Result<CacheKey>
    where
        P: Serialize + ?Sized,
        K: Serialize + ?Sized,
    {
        derive(&self.id, positional, keyword)
    }

    // == Call ==
    /// Calls with positional arguments only (use a tuple for several).
    ///
    /// # Errors
    /// Only [`CacheError::KeyDerivation`]; the callable is not run in that case.
    pub fn call<P>(&self, args: P) -> Result<V>
    where
        F: Fn(P) -> V,
        P: Serialize,
    {
        let key = derive(&self.id, &args, &())?;
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        Ok(self.store(&key, (self.func)(args)))
    }

    /// Calls with positional and keyword arguments.
    ///
    /// `keyword` must serialize to a map (a struct, `HashMap`, or
    /// [`Kwargs`](crate::cache::Kwargs)); its field order never affects the key.
    pub fn call_kw<P, K>(&self, positional: P, keyword: K) -> Result<V>
    where
        F: Fn(P, K) -> V,
        P: Serialize,
        K: Serialize,
    {
        let key = derive(&self.id, &positional, &keyword)?;
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        Ok(self.store(&key, (self.func)(positional, keyword)))
    }

    /// Calls a fallible callable. `Err` results are returned and not cached.
    pub fn try_call<P, E>(&self, args: P) -> std::result::Result<V, E>
    where
        F: Fn(P) -> std::result::Result<V, E>,
        P: Serialize,
        E: From<CacheError>,
    {
        let key = derive(&self.id, &args, &())?;
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        match (self.func)(args) {
            Ok(value) => Ok(self.store(&key, value)),
            Err(err) => {
                debug!(callable = %self.id, key = %key, "Callable failed, result not cached");
                Err(err)
            }
        }
    }

    // == Inspection ==
    /// Whether a fresh entry exists for these positional arguments.
    ///
    /// Does not run the callable or touch the counters. An unreadable backend
    /// answers `false`.
    pub fn contains<P>(&self, args: &P) -> Result<bool>
    where
        P: Serialize + ?Sized,
    {
        self.contains_kw(args, &())
    }

    /// [`Memoized::contains`] for calls that also pass keyword arguments.
    pub fn contains_kw<P, K>(&self, positional: &P, keyword: &K) -> Result<bool>
    where
        P: Serialize + ?Sized,
        K: Serialize + ?Sized,
    {
        let key = derive(&self.id, positional, keyword)?;
        Ok(matches!(self.backend.get(&key), Ok(Some(entry)) if self.policy.is_fresh(&entry)))
    }

    /// Number of entries stored for this callable, fresh or not.
    pub fn len(&self) -> Result<usize> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.backend.is_empty()
    }

    /// Snapshot of the counters plus the current entry count.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        match self.backend.len() {
            Ok(count) => stats.set_total_entries(count),
            Err(e) => warn!(callable = %self.id, error = %e, "Cannot count cache entries"),
        }
        stats
    }

    // == Maintenance ==
    /// Drops the entry for these positional arguments.
    pub fn invalidate<P>(&self, args: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.invalidate_kw(args, &())
    }

    /// Drops the entry for these positional and keyword arguments.
    pub fn invalidate_kw<P, K>(&self, positional: &P, keyword: &K) -> Result<()>
    where
        P: Serialize + ?Sized,
        K: Serialize + ?Sized,
    {
        let key = derive(&self.id, positional, keyword)?;
        self.backend.delete(&key)
    }

    /// Removes every entry of this callable.
    pub fn clear(&self) -> Result<()> {
        self.backend.clear()?;
        info!(callable = %self.id, "Cache cleared");
        Ok(())
    }

    // == Purge Expired ==
    /// Removes stale and unreadable entries, returning how many were dropped.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys()? {
            let stale = match self.backend.get(&key) {
                Ok(Some(entry)) => !self.policy.is_fresh(&entry),
                Ok(None) => false,
                Err(CacheError::Deserialization(_)) => true,
                Err(e) => return Err(e),
            };
            if stale {
                self.backend.delete(&key)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(callable = %self.id, removed, "Purged expired entries");
        } else {
            debug!(callable = %self.id, "No expired entries found");
        }
        Ok(removed)
    }

    // == Internals ==
    /// Returns a fresh cached value, recording the outcome.
    fn lookup(&self, key: &CacheKey) -> Option<V> {
        match self.backend.get(key) {
            Ok(Some(entry)) if self.policy.is_fresh(&entry) => {
                self.stats.lock().record_hit();
                debug!(callable = %self.id, key = %key, "Cache hit");
                Some(entry.into_value())
            }
            Ok(Some(_)) => {
                self.stats.lock().record_expire();
                debug!(callable = %self.id, key = %key, "Cache entry expired");
                None
            }
            Ok(None) => {
                self.stats.lock().record_miss();
                debug!(callable = %self.id, key = %key, "Cache miss");
                None
            }
            Err(e) => {
                self.stats.lock().record_miss();
                warn!(
                    callable = %self.id,
                    key = %key,
                    error = %e,
                    "Cache lookup failed, recomputing"
                );
                None
            }
        }
    }

    /// Writes a freshly computed value back and hands it to the caller.
    fn store(&self, key: &CacheKey, value: V) -> V {
        let entry = CacheEntry::new(value);
        if let Err(e) = self.backend.set(key, &entry) {
            warn!(
                callable = %self.id,
                key = %key,
                error = %e,
                "Cache write failed, returning uncached result"
            );
        }
        entry.into_value()
    }
}
