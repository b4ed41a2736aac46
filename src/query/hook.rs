//! Cached query bound to one resource and filter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::cache::SharedCache;
use crate::error::Result;
use crate::events::{EventBus, EventKind};
use crate::feed::{ChangeNotification, QueryFilter, Record, RemoteStore};
use crate::subscription::{ChannelStatus, Refresher, SubscriptionManager};

/// Data-fetching hook: memoizes one query and keeps it fresh from the change-feed.
pub struct QueryHook {
    resource: String,
    filter: QueryFilter,
    store: Arc<dyn RemoteStore>,
    cache: SharedCache<Vec<Record>>,
    bus: EventBus,
}

impl QueryHook {
    pub fn new(
        resource: impl Into<String>,
        filter: QueryFilter,
        store: Arc<dyn RemoteStore>,
        cache: SharedCache<Vec<Record>>,
        bus: EventBus,
    ) -> Self {
        Self {
            resource: resource.into(),
            filter,
            store,
            cache,
            bus,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn cache_key(&self) -> String {
        self.filter.cache_key(&self.resource)
    }

    /// Rows currently cached for this query, without touching the store.
    pub async fn cached(&self) -> Option<Vec<Record>> {
        self.cache.write().await.get(&self.cache_key())
    }

    /// Milliseconds until the cached rows go stale, `None` if nothing is cached
    /// or the cache has no TTL.
    pub async fn ttl_remaining_ms(&self) -> Option<u64> {
        self.cache.read().await.ttl_remaining_ms(&self.cache_key())
    }

    /// Cached rows if fresh, otherwise queries the store and caches the result.
    pub async fn fetch(&self) -> Result<Vec<Record>> {
        let key = self.cache_key();
        let cached = self.cache.write().await.get(&key);
        if let Some(rows) = cached {
            debug!(key = %key, "Query served from cache");
            return Ok(rows);
        }

        let rows = self.store.select(&self.resource, &self.filter).await?;
        debug!(key = %key, rows = rows.len(), "Query fetched from store");
        self.cache.write().await.set(key, rows.clone());
        Ok(rows)
    }

    /// Starts `manager` on this hook's resource with the hook as refresher.
    pub fn watch<F>(self: &Arc<Self>, manager: &SubscriptionManager, on_state_change: F) -> Result<()>
    where
        F: Fn(&ChannelStatus) + Send + Sync + 'static,
    {
        manager.start(self.resource.clone(), Arc::clone(self), on_state_change)
    }
}

#[async_trait]
impl Refresher for QueryHook {
    type Output = Vec<Record>;

    async fn refresh(&self, _change: &ChangeNotification) -> Result<Vec<Record>> {
        self.store.select(&self.resource, &self.filter).await
    }

    async fn apply(&self, rows: Vec<Record>) {
        let key = self.cache_key();
        let count = rows.len();
        self.cache.write().await.set(key.clone(), rows);

        self.bus.publish(
            EventKind::ResourcesRefreshed,
            json!({
                "resource": self.resource,
                "key": key,
                "rows": count,
            }),
        );
    }
}
