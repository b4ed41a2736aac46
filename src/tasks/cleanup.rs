//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that periodically purges expired cache entries.
///
/// Expired entries are already invisible to readers; the sweep only returns
/// their memory early. Abort the returned handle on shutdown.
///
/// # Example
/// ```ignore
/// let cache = shared(BoundedCache::new(100, Some(Duration::from_secs(300)))?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(5));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.write().await.cleanup_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared, BoundedCache, ManualClock};
    use std::sync::Arc;

    fn manual_cache() -> (SharedCache<String>, ManualClock) {
        let clock = ManualClock::new(0);
        let cache = BoundedCache::with_clock(
            100,
            Some(Duration::from_millis(500)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (shared(cache), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock) = manual_cache();
        cache.write().await.set("expire_soon".to_string(), "value".to_string());

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
        clock.advance(Duration::from_millis(600));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let guard = cache.read().await;
            assert!(guard.is_empty(), "Expired entry should have been cleaned up");
            assert_eq!(guard.stats().expirations, 1);
        }

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let (cache, clock) = manual_cache();
        cache.write().await.set("long_lived".to_string(), "value".to_string());

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
        clock.advance(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            cache.write().await.get(&"long_lived".to_string()),
            Some("value".to_string())
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _) = manual_cache();

        let handle = spawn_cleanup_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
