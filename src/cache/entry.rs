//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

// == Cache Entry ==
/// A cached value with its access order and insertion time.
///
/// Expiry is always measured from `inserted_at`; reading an entry bumps
/// `access_order` but never extends its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Position in the recency order, higher = more recently used
    pub access_order: u64,
    /// Insertion timestamp (milliseconds, from the cache clock)
    pub inserted_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry inserted at `now_ms`.
    pub fn new(value: V, access_order: u64, now_ms: u64) -> Self {
        Self {
            value,
            access_order,
            inserted_at: now_ms,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since insertion.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.inserted_at)
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived `ttl`.
    ///
    /// Boundary condition: the entry is expired once its age reaches the TTL,
    /// so a 100ms entry read exactly 100ms after insertion is already gone.
    /// Without a TTL the entry never expires.
    pub fn is_expired(&self, ttl: Option<Duration>, now_ms: u64) -> bool {
        match ttl {
            Some(ttl) => self.age_ms(now_ms) >= ttl.as_millis() as u64,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, `None` without a TTL.
    pub fn ttl_remaining_ms(&self, ttl: Option<Duration>, now_ms: u64) -> Option<u64> {
        ttl.map(|ttl| (ttl.as_millis() as u64).saturating_sub(self.age_ms(now_ms)))
    }
}
