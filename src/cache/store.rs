//! Cache Store Module
//!
//! Bounded cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, Clock, LruTracker, SystemClock};
use crate::error::{Result, SyncError};

// == Bounded Cache ==
/// Fixed-capacity LRU map with optional per-entry expiry.
///
/// `len() <= capacity()` holds after every operation. Entries older than the
/// TTL are treated as absent even before they are physically removed.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
    /// Freshness window measured from insertion
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache backed by the system clock.
    ///
    /// # Errors
    /// `InvalidCapacity` when `capacity` is 0, `InvalidTtl` when `ttl` is zero.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Result<Self> {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(capacity: usize, ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Result<Self> {
        if capacity == 0 {
            return Err(SyncError::InvalidCapacity(capacity));
        }
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(SyncError::InvalidTtl);
        }

        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
            ttl,
            clock,
        })
    }

    // == Get ==
    /// Returns the value for `key` and promotes it to most recently used.
    ///
    /// Expired entries are removed on the spot and reported as absent.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired(self.ttl, now) {
            let order = entry.access_order;
            self.entries.remove(key);
            self.lru.remove(order);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        entry.access_order = self.lru.touch(key.clone(), Some(entry.access_order));
        self.stats.record_hit();
        Some(entry.value.clone())
    }

    // == Set ==
    /// Stores `value` under `key` as the most recently used entry.
    ///
    /// An existing entry is replaced and its expiry clock restarts. Inserting a
    /// new key into a full cache first evicts the least recently used entry.
    pub fn set(&mut self, key: K, value: V) {
        let now = self.clock.now_ms();

        let previous = self.entries.get(&key).map(|entry| entry.access_order);
        if previous.is_none() && self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        let order = self.lru.touch(key.clone(), previous);
        self.entries.insert(key, CacheEntry::new(value, order, now));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Delete ==
    /// Removes `key`. Returns whether an entry was present.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.lru.remove(entry.access_order);
                self.stats.set_total_entries(self.entries.len());
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Drops every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    /// Whether `key` holds a live entry. Does not affect recency or stats.
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl, now))
    }

    // == Time To Live ==
    /// Milliseconds until `key` expires.
    ///
    /// `None` when the key is absent or expired, or when the cache has no TTL.
    /// Does not affect recency or stats.
    pub fn ttl_remaining_ms(&self, key: &K) -> Option<u64> {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .and_then(|entry| entry.ttl_remaining_ms(self.ttl, now))
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.ttl;
        let expired: Vec<(K, u64)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl, now))
            .map(|(key, entry)| (key.clone(), entry.access_order))
            .collect();

        let count = expired.len();
        for (key, order) in expired {
            self.entries.remove(&key);
            self.lru.remove(order);
        }

        self.stats.record_expirations(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    /// Keys from least to most recently used, expired ones included.
    pub fn keys(&self) -> Vec<K> {
        self.lru.iter().cloned().collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn evict_lru(&mut self) {
        if let Some(evicted) = self.lru.evict_oldest() {
            self.entries.remove(&evicted);
            self.stats.record_eviction();
            debug!(size = self.entries.len(), "Evicted least recently used cache entry");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn manual_cache(capacity: usize, ttl_ms: Option<u64>) -> (BoundedCache<&'static str, i32>, ManualClock) {
        let clock = ManualClock::new(10_000);
        let cache = BoundedCache::with_clock(
            capacity,
            ttl_ms.map(Duration::from_millis),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (cache, clock)
    }

    #[test]
    fn test_cache_new() {
        let cache: BoundedCache<String, String> = BoundedCache::new(100, None).unwrap();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 100);
    }

    #[test]
    fn test_cache_rejects_zero_capacity() {
        let result: Result<BoundedCache<String, String>> = BoundedCache::new(0, None);
        assert_eq!(result.unwrap_err(), SyncError::InvalidCapacity(0));
    }

    #[test]
    fn test_cache_rejects_zero_ttl() {
        let result: Result<BoundedCache<String, String>> = BoundedCache::new(4, Some(Duration::ZERO));
        assert_eq!(result.unwrap_err(), SyncError::InvalidTtl);
    }

    #[test]
    fn test_cache_set_and_get() {
        let (mut cache, _) = manual_cache(10, None);

        cache.set("key1", 1);

        assert_eq!(cache.get(&"key1"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_get_missing() {
        let (mut cache, _) = manual_cache(10, None);
        assert_eq!(cache.get(&"nope"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_overwrite() {
        let (mut cache, _) = manual_cache(10, None);

        cache.set("key1", 1);
        cache.set("key1", 2);

        assert_eq!(cache.get(&"key1"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_lru_scenario() {
        let (mut cache, _) = manual_cache(2, None);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.get(&"a");
        cache.set("c", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_overwrite_promotes_without_eviction() {
        let (mut cache, _) = manual_cache(2, None);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert_eq!(cache.keys(), vec!["a", "c"]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_ttl_expiration() {
        let (mut cache, clock) = manual_cache(10, Some(100));

        cache.set("k", 1);
        clock.advance(Duration::from_millis(150));

        assert_eq!(cache.get(&"k"), None);
        assert!(cache.is_empty(), "Expired entry should be evicted eagerly");
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_cache_get_does_not_extend_expiry() {
        let (mut cache, clock) = manual_cache(10, Some(100));

        cache.set("k", 1);
        clock.advance(Duration::from_millis(60));
        assert_eq!(cache.get(&"k"), Some(1));

        clock.advance(Duration::from_millis(60));
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn test_cache_set_restarts_expiry() {
        let (mut cache, clock) = manual_cache(10, Some(100));

        cache.set("k", 1);
        clock.advance(Duration::from_millis(80));
        cache.set("k", 2);
        clock.advance(Duration::from_millis(80));

        assert_eq!(cache.get(&"k"), Some(2));
    }

    #[test]
    fn test_cache_delete_and_clear() {
        let (mut cache, _) = manual_cache(10, None);

        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.delete(&"a"));
        assert!(!cache.delete(&"a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
        cache.clear();
    }

    #[test]
    fn test_cache_ttl_remaining() {
        let (mut cache, clock) = manual_cache(4, Some(100));
        cache.set("a", 1);
        clock.advance(Duration::from_millis(40));

        assert_eq!(cache.ttl_remaining_ms(&"a"), Some(60));
        assert_eq!(cache.ttl_remaining_ms(&"missing"), None);
        assert_eq!(cache.stats().hits + cache.stats().misses, 0);

        clock.advance(Duration::from_millis(60));
        assert_eq!(cache.ttl_remaining_ms(&"a"), None);

        let (mut forever, _) = manual_cache(4, None);
        forever.set("a", 1);
        assert_eq!(forever.ttl_remaining_ms(&"a"), None);
    }

    #[test]
    fn test_cache_cleanup_expired() {
        let (mut cache, clock) = manual_cache(10, Some(100));

        cache.set("old", 1);
        clock.advance(Duration::from_millis(70));
        cache.set("new", 2);
        clock.advance(Duration::from_millis(50));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), vec!["new"]);
        assert_eq!(cache.get(&"new"), Some(2));
    }

    #[test]
    fn test_cache_stats() {
        let (mut cache, _) = manual_cache(10, None);

        cache.set("key1", 1);
        cache.get(&"key1");
        cache.get(&"missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
