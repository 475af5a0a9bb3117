//! TTL Policy Module
//!
//! Decides whether a stored entry is still fresh. Applied by the memoizing
//! wrapper for every backend; the backends themselves never look at time.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;

// == TTL Policy ==
/// Fixed time-to-live shared by every entry of one memoized callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl: Duration,
}

impl TtlPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Is Valid ==
    /// Returns true iff `now - entry.created_at < ttl`.
    ///
    /// Boundary condition: an entry whose age equals the TTL exactly is
    /// expired, so a coarse clock can never keep an entry alive forever.
    /// A zero TTL therefore expires everything.
    pub fn is_valid<V>(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        entry.age(now) < self.ttl
    }

    /// [`TtlPolicy::is_valid`] evaluated against the current clock.
    pub fn is_fresh<V>(&self, entry: &CacheEntry<V>) -> bool {
        self.is_valid(entry, Utc::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entry_aged(now: DateTime<Utc>, age_ms: i64) -> CacheEntry<&'static str> {
        CacheEntry::with_timestamp("v", now - ChronoDuration::milliseconds(age_ms))
    }

    #[test]
    fn test_fresh_entry_is_valid() {
        let policy = TtlPolicy::new(Duration::from_secs(10));
        let now = Utc::now();

        assert!(policy.is_valid(&entry_aged(now, 0), now));
        assert!(policy.is_valid(&entry_aged(now, 9_999), now));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let policy = TtlPolicy::new(Duration::from_secs(10));
        let now = Utc::now();

        // Age exactly equal to the TTL is expired
        assert!(!policy.is_valid(&entry_aged(now, 10_000), now));
        assert!(!policy.is_valid(&entry_aged(now, 10_001), now));
    }

    #[test]
    fn test_zero_ttl_expires_everything() {
        let policy = TtlPolicy::new(Duration::ZERO);
        let now = Utc::now();

        assert!(!policy.is_valid(&entry_aged(now, 0), now));
    }

    #[test]
    fn test_future_timestamp_is_valid() {
        let policy = TtlPolicy::new(Duration::from_secs(1));
        let now = Utc::now();
        let entry = CacheEntry::with_timestamp(1, now + ChronoDuration::seconds(30));

        assert!(policy.is_valid(&entry, now));
    }

    #[test]
    fn test_is_fresh_uses_clock() {
        let policy = TtlPolicy::new(Duration::from_secs(60));
        assert!(policy.is_fresh(&CacheEntry::new(1)));
    }
}
