//! Seams to the remote queryable store and its change-feed.

use async_trait::async_trait;

use super::{ChangeKind, FeedSignal, QueryFilter, Record};
use crate::error::{Result, SyncError};

/// Push-based stream of row mutations, one channel per resource.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a channel for `resource`.
    ///
    /// The first signal of a healthy channel is [`FeedSignal::Subscribed`].
    async fn open(&self, resource: &str) -> Result<Box<dyn FeedChannel>>;
}

/// One live subscription to the change-feed.
#[async_trait]
pub trait FeedChannel: Send {
    /// Waits for the next signal. Returns `Closed` forever once the channel ended.
    async fn next_signal(&mut self) -> FeedSignal;

    /// Releases the remote subscription. Calling it again is a no-op.
    async fn release(&mut self);
}

/// Row-level access to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, resource: &str, filter: &QueryFilter) -> Result<Vec<Record>>;

    async fn insert(&self, resource: &str, record: Record) -> Result<Record>;

    async fn update(&self, resource: &str, record: Record) -> Result<Record>;

    async fn delete(&self, resource: &str, id: &str) -> Result<Record>;

    /// Updates the row with `record.id`, inserting it when missing.
    ///
    /// Returns `Update` or `Insert` for what happened. The default runs two
    /// store calls, so a concurrent insert of the same id can still fail it;
    /// stores that can do better override it.
    async fn upsert(&self, resource: &str, record: Record) -> Result<ChangeKind> {
        match self.update(resource, record.clone()).await {
            Ok(_) => Ok(ChangeKind::Update),
            Err(SyncError::NotFound(_)) => {
                self.insert(resource, record).await?;
                Ok(ChangeKind::Insert)
            }
            Err(err) => Err(err),
        }
    }
}
