//! Cache Statistics Module
//!
//! Tracks memoization outcomes: hits, misses and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Per-callable counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls with no usable entry (absent, unreadable or backend failure)
    pub misses: u64,
    /// Calls that found an entry older than the TTL
    pub expires: u64,
    /// Entries currently stored for this callable
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / lookups, or 0.0 if nothing has been looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups recorded.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.expires
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expire(&mut self) {
        self.expires += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
