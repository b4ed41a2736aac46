//! Cache Module
//!
//! Bounded, time-aware memoization of remote query results.

mod clock;
mod entry;
mod lru;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::BoundedCache;

/// Cache shared between hooks, refreshes and the cleanup task.
///
/// Query results are keyed by their serialized filter description.
pub type SharedCache<V> = Arc<RwLock<BoundedCache<String, V>>>;

/// Wraps a cache for shared use.
pub fn shared<V>(cache: BoundedCache<String, V>) -> SharedCache<V> {
    Arc::new(RwLock::new(cache))
}
