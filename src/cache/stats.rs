//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent or expired)
    pub misses: u64,
    /// Entries dropped to make room under the capacity bound
    pub evictions: u64,
    /// Entries dropped because they outlived the TTL
    pub expirations: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a zeroed stats record.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Recorders ==
    /// Records a lookup that returned a live entry.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Records a lookup that found nothing or an expired entry.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Records one entry dropped to respect the capacity.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Records `count` entries dropped for outliving the TTL.
    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Updates the current entry count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
