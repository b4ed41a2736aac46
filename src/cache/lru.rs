//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::BTreeMap;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch hands out a fresh, strictly increasing order number, so the
/// smallest number is always the least recently used key. Callers keep the
/// order number on their entry and hand it back on the next touch or removal.
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Access order number -> key
    order: BTreeMap<u64, K>,
    /// Next order number to hand out
    next: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used and returns its new order number.
    ///
    /// `previous` is the order number the key held before, if any.
    pub fn touch(&mut self, key: K, previous: Option<u64>) -> u64 {
        if let Some(prev) = previous {
            self.order.remove(&prev);
        }
        let order = self.next;
        self.next += 1;
        self.order.insert(order, key);
        order
    }

    // == Remove ==
    /// Forgets the key holding `order`.
    pub fn remove(&mut self, order: u64) -> Option<K> {
        self.order.remove(&order)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    /// Keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru: LruTracker<String> = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1", None);
        lru.touch("key2", None);
        lru.touch("key3", None);

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.iter().next(), Some(&"key1"));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        let first = lru.touch("key1", None);
        lru.touch("key2", None);
        lru.touch("key3", None);

        let again = lru.touch("key1", Some(first));

        assert!(again > first);
        assert_eq!(lru.len(), 3);
        assert_eq!(lru.iter().next(), Some(&"key2"));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruTracker::new();

        lru.touch("key1", None);
        lru.touch("key2", None);

        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.evict_oldest(), Some("key2"));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1", None);
        let second = lru.touch("key2", None);
        lru.touch("key3", None);

        assert_eq!(lru.remove(second), Some("key2"));
        assert_eq!(lru.remove(second), None);
        assert_eq!(lru.iter().copied().collect::<Vec<_>>(), vec!["key1", "key3"]);
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        let a = lru.touch("a", None);
        let b = lru.touch("b", None);
        let c = lru.touch("c", None);

        lru.touch("a", Some(a));
        let c = lru.touch("c", Some(c));
        lru.touch("b", Some(b));

        assert_eq!(lru.evict_oldest(), Some("a"));
        assert_eq!(lru.evict_oldest(), Some("c"));
        assert_eq!(lru.evict_oldest(), Some("b"));
        assert!(lru.remove(c).is_none());
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();
        lru.touch(1, None);
        lru.touch(2, None);

        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.iter().next(), None);
    }
}
