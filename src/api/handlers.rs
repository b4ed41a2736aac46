//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::cache::{shared, BoundedCache, SharedCache};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::events::EventBus;
use crate::feed::{ChangeFeed, ChangeKind, QueryFilter, Record, RemoteStore};
use crate::models::{
    EventsQuery, EventsResponse, HealthResponse, MutationResponse, RecordRequest,
    ResourceResponse, StatsResponse, SubscriptionsResponse,
};
use crate::query::QueryHook;
use crate::subscription::{ChannelState, SubscriptionManager};

/// One watched resource: its cached query and the manager keeping it fresh.
#[derive(Clone)]
pub struct Watch {
    pub hook: Arc<QueryHook>,
    pub manager: Arc<SubscriptionManager>,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache<Vec<Record>>,
    pub bus: EventBus,
    pub store: Arc<dyn RemoteStore>,
    /// Watched resources by name
    pub watches: Arc<BTreeMap<String, Watch>>,
}

impl AppState {
    /// Builds the cache, bus, and one hook plus manager per watched resource.
    ///
    /// # Errors
    /// Fails when the configured cache capacity, TTL or reconnect policy is invalid.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn RemoteStore>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Result<Self> {
        let cache = shared(BoundedCache::new(config.cache_capacity, config.cache_ttl())?);
        let policy = config.backoff_policy()?;
        let bus = EventBus::new();

        let watches = config
            .watched_resources
            .iter()
            .map(|resource| {
                let hook = Arc::new(QueryHook::new(
                    resource.clone(),
                    QueryFilter::all(),
                    Arc::clone(&store),
                    Arc::clone(&cache),
                    bus.clone(),
                ));
                let manager = Arc::new(SubscriptionManager::new(
                    Arc::clone(&feed),
                    bus.clone(),
                    policy,
                ));
                (resource.clone(), Watch { hook, manager })
            })
            .collect();

        Ok(Self {
            cache,
            bus,
            store,
            watches: Arc::new(watches),
        })
    }

    /// Starts a change-feed subscription for every watched resource.
    pub fn start_watching(&self) -> Result<()> {
        for watch in self.watches.values() {
            watch.hook.watch(&watch.manager, |status| {
                info!(
                    resource = %status.resource,
                    state = ?status.state,
                    attempt = status.attempt_count,
                    retry_in_ms = ?status.retry_in_ms,
                    "Subscription state changed"
                );
            })?;
        }
        Ok(())
    }

    /// Stops every subscription. Safe to call repeatedly.
    pub async fn stop_watching(&self) {
        for watch in self.watches.values() {
            watch.manager.stop().await;
        }
    }

    fn watch(&self, resource: &str) -> Result<&Watch> {
        self.watches
            .get(resource)
            .ok_or_else(|| SyncError::NotFound(format!("resource '{resource}' is not watched")))
    }
}

/// Handler for GET /resources/:name
///
/// Reads through the cache; a miss queries the store.
pub async fn get_resource_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<ResourceResponse>> {
    let hook = &state.watch(&resource)?.hook;
    let rows = hook.fetch().await?;
    let ttl_remaining_ms = hook.ttl_remaining_ms().await;
    Ok(Json(ResourceResponse::new(resource, rows, ttl_remaining_ms)))
}

/// Handler for PUT /resources/:name/:id
///
/// Inserts or updates a row in the store, which drives the change-feed.
/// Atomic only when the store overrides `RemoteStore::upsert`.
pub async fn put_record_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(req): Json<RecordRequest>,
) -> Result<Json<MutationResponse>> {
    if let Some(error_msg) = req.validate(&id) {
        return Err(SyncError::InvalidRequest(error_msg));
    }
    let record = req.into_record(&id);

    let action = match state.store.upsert(&resource, record.clone()).await? {
        ChangeKind::Insert => "created",
        _ => "updated",
    };

    Ok(Json(MutationResponse::new(action, resource, record)))
}

/// Handler for DELETE /resources/:name/:id
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>> {
    let removed = state.store.delete(&resource, &id).await?;
    Ok(Json(MutationResponse::new("deleted", resource, removed)))
}

/// Handler for GET /events
///
/// Returns the bounded event history, oldest first.
pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let mut events = state.bus.history();
    if let Some(limit) = query.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    Json(EventsResponse::new(events))
}

/// Handler for GET /subscriptions
pub async fn subscriptions_handler(State(state): State<AppState>) -> Json<SubscriptionsResponse> {
    let subscriptions = state
        .watches
        .values()
        .map(|watch| watch.manager.status())
        .collect();
    Json(SubscriptionsResponse { subscriptions })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    Json(StatsResponse::new(&cache.stats(), cache.capacity()))
}

/// Handler for GET /health
///
/// Degraded while any watched channel is not subscribed; cached data stays readable.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let all_subscribed = state
        .watches
        .values()
        .all(|watch| watch.manager.status().state == ChannelState::Subscribed);
    Json(HealthResponse::new(all_subscribed))
}
