//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::events::Event;
use crate::feed::Record;
use crate::subscription::ChannelStatus;

/// Response body for `GET /resources/:name`
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResponse {
    pub resource: String,
    pub rows: Vec<Record>,
    /// Milliseconds until the cached rows go stale, omitted without a TTL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_remaining_ms: Option<u64>,
}

impl ResourceResponse {
    pub fn new(resource: impl Into<String>, rows: Vec<Record>, ttl_remaining_ms: Option<u64>) -> Self {
        Self {
            resource: resource.into(),
            rows,
            ttl_remaining_ms,
        }
    }
}

/// Response body for `PUT`/`DELETE /resources/:name/:id`
#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    /// Success message
    pub message: String,
    pub resource: String,
    pub record: Record,
}

impl MutationResponse {
    pub fn new(action: &str, resource: impl Into<String>, record: Record) -> Self {
        let resource = resource.into();
        Self {
            message: format!("Record '{}' {} in '{}'", record.id, action, resource),
            resource,
            record,
        }
    }
}

/// Response body for the stats endpoint (`GET /stats`)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, capacity: usize) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            capacity,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for `GET /events`
#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub count: usize,
}

impl EventsResponse {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            count: events.len(),
            events,
        }
    }
}

/// Response body for `GET /subscriptions`
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<ChannelStatus>,
}

/// Response body for the health endpoint (`GET /health`)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every watched channel is subscribed, else "degraded"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(all_subscribed: bool) -> Self {
        let status = if all_subscribed { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
