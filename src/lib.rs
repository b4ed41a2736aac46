//! callsync - real-time sync core for a call-analytics dashboard
//!
//! A bounded TTL/LRU cache, a synchronous event bus, and change-feed
//! subscriptions that reconnect with backoff and refresh cached queries.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod models;
pub mod query;
pub mod subscription;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{BoundedCache, CacheStats, SharedCache};
pub use config::Config;
pub use error::{Result, SyncError};
pub use events::{Event, EventBus, EventKind};
pub use feed::{ChangeFeed, InMemoryBackend, RemoteStore};
pub use query::QueryHook;
pub use subscription::{BackoffPolicy, ChannelState, SubscriptionManager};
pub use tasks::spawn_cleanup_task;
