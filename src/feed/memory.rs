//! In-process store and change-feed.
//!
//! Stands in for the hosted backend in the diagnostics binary and in tests:
//! every successful mutation is pushed to the open channels of its resource,
//! and connectivity faults can be injected on demand.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{ChangeFeed, ChangeKind, ChangeNotification, FeedChannel, FeedSignal, QueryFilter, Record, RemoteStore};
use crate::error::{Result, SyncError};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct BackendState {
    tables: HashMap<String, BTreeMap<String, Record>>,
    feeds: HashMap<String, broadcast::Sender<FeedSignal>>,
    offline: bool,
    failing_opens: u32,
    opens: u64,
}

impl BackendState {
    fn feed(&mut self, resource: &str) -> &broadcast::Sender<FeedSignal> {
        self.feeds
            .entry(resource.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
    }

    fn notify(&mut self, change: ChangeNotification) {
        let resource = change.resource.clone();
        // Nobody listening is fine; the change simply goes unobserved.
        let _ = self.feed(&resource).send(FeedSignal::Change(change));
    }
}

/// Shared handle to an in-memory backend. Clones see the same data.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every `open` until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
        info!(offline, "In-memory backend connectivity changed");
    }

    /// Makes the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.lock().failing_opens = count;
    }

    /// Sends an error to every open channel of `resource`, as if the link dropped.
    pub fn drop_connections(&self, resource: &str) -> usize {
        let mut state = self.lock();
        let reached = state
            .feed(resource)
            .send(FeedSignal::Error("connection reset".to_string()))
            .unwrap_or(0);
        info!(resource, reached, "Dropped in-memory connections");
        reached
    }

    /// Number of channels currently subscribed to `resource`.
    pub fn open_channels(&self, resource: &str) -> usize {
        self.lock()
            .feeds
            .get(resource)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total `open` calls, successful or not.
    pub fn open_attempts(&self) -> u64 {
        self.lock().opens
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn open(&self, resource: &str) -> Result<Box<dyn FeedChannel>> {
        let mut state = self.lock();
        state.opens += 1;

        if state.offline {
            return Err(SyncError::Feed("backend unreachable".to_string()));
        }
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(SyncError::Feed("subscription rejected".to_string()));
        }

        let receiver = state.feed(resource).subscribe();
        debug!(resource, "In-memory channel opened");
        Ok(Box::new(MemoryChannel {
            receiver: Some(receiver),
            acknowledged: false,
        }))
    }
}

struct MemoryChannel {
    receiver: Option<broadcast::Receiver<FeedSignal>>,
    acknowledged: bool,
}

#[async_trait]
impl FeedChannel for MemoryChannel {
    async fn next_signal(&mut self) -> FeedSignal {
        let Some(receiver) = self.receiver.as_mut() else {
            return FeedSignal::Closed;
        };
        if !self.acknowledged {
            self.acknowledged = true;
            return FeedSignal::Subscribed;
        }

        match receiver.recv().await {
            Ok(signal) => signal,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                FeedSignal::Error(format!("channel lagged, {skipped} changes lost"))
            }
            Err(broadcast::error::RecvError::Closed) => FeedSignal::Closed,
        }
    }

    async fn release(&mut self) {
        self.receiver = None;
    }
}

#[async_trait]
impl RemoteStore for InMemoryBackend {
    async fn select(&self, resource: &str, filter: &QueryFilter) -> Result<Vec<Record>> {
        let state = self.lock();
        if state.offline {
            return Err(SyncError::Store("backend unreachable".to_string()));
        }

        let rows = state
            .tables
            .get(resource)
            .map(|table| {
                table
                    .values()
                    .filter(|record| filter.matches(record))
                    .take(filter.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, resource: &str, record: Record) -> Result<Record> {
        let mut state = self.lock();
        let table = state.tables.entry(resource.to_string()).or_default();
        if table.contains_key(&record.id) {
            return Err(SyncError::InvalidRequest(format!(
                "{resource}/{} already exists",
                record.id
            )));
        }
        table.insert(record.id.clone(), record.clone());
        state.notify(ChangeNotification::insert(resource, record.clone()));
        Ok(record)
    }

    async fn update(&self, resource: &str, record: Record) -> Result<Record> {
        let mut state = self.lock();
        let old = state
            .tables
            .get_mut(resource)
            .and_then(|table| table.get_mut(&record.id))
            .map(|slot| std::mem::replace(slot, record.clone()))
            .ok_or_else(|| SyncError::NotFound(format!("{resource}/{}", record.id)))?;
        state.notify(ChangeNotification::update(resource, old, record.clone()));
        Ok(record)
    }

    async fn upsert(&self, resource: &str, record: Record) -> Result<ChangeKind> {
        let mut state = self.lock();
        let old = state
            .tables
            .entry(resource.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());

        let (kind, change) = match old {
            Some(old) => (ChangeKind::Update, ChangeNotification::update(resource, old, record)),
            None => (ChangeKind::Insert, ChangeNotification::insert(resource, record)),
        };
        state.notify(change);
        Ok(kind)
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<Record> {
        let mut state = self.lock();
        let old = state
            .tables
            .get_mut(resource)
            .and_then(|table| table.remove(id))
            .ok_or_else(|| SyncError::NotFound(format!("{resource}/{id}")))?;
        state.notify(ChangeNotification::delete(resource, old.clone()));
        Ok(old)
    }
}
