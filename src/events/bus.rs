//! In-process publish/subscribe registry with a bounded history.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error};

use super::{Event, EventKind};

/// Number of events kept for on-demand inspection.
pub const MAX_HISTORY: usize = 100;

/// Buffer of the out-of-registry broadcast channel.
pub const BROADCAST_CAPACITY: usize = 256;

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registration {
    id: u64,
    listener: Listener,
}

struct BusInner {
    listeners: Mutex<HashMap<EventKind, Vec<Registration>>>,
    history: Mutex<VecDeque<Event>>,
    history_limit: usize,
    sender: broadcast::Sender<Event>,
    next_id: AtomicU64,
}

/// Typed event bus.
///
/// Cloning yields another handle to the same registry. Listeners run
/// synchronously inside `publish`, outside any internal lock, so they may
/// subscribe, unsubscribe or publish themselves.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(MAX_HISTORY)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::with_capacity(history_limit)),
                history_limit,
                sender,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `callback` for `kind`.
    ///
    /// The listener stays registered until [`Subscription::unsubscribe`] is
    /// called; dropping the handle does not remove it.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners)
            .entry(kind)
            .or_default()
            .push(Registration {
                id,
                listener: Arc::new(callback),
            });

        debug!(kind = %kind, id, "Listener registered");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Publishes an event to every listener registered for `kind`.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run and the panic never reaches the caller.
    pub fn publish(&self, kind: EventKind, payload: Value) -> Event {
        let event = Event::new(kind, payload);

        {
            let mut history = lock(&self.inner.history);
            history.push_back(event.clone());
            while history.len() > self.inner.history_limit {
                history.pop_front();
            }
        }

        let snapshot: Vec<Listener> = lock(&self.inner.listeners)
            .get(&kind)
            .map(|regs| regs.iter().map(|r| Arc::clone(&r.listener)).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                error!(kind = %kind, reason = %panic_message(&panic), "Event listener panicked");
            }
        }

        // No receivers is the normal case for fire-and-forget delivery.
        let receivers = self.inner.sender.send(event.clone()).unwrap_or(0);
        debug!(kind = %kind, listeners = snapshot.len(), receivers, "Event published");

        event
    }

    /// Receiver for every event published from now on.
    pub fn watch(&self) -> broadcast::Receiver<Event> {
        self.inner.sender.subscribe()
    }

    /// Recent events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        lock(&self.inner.history).iter().cloned().collect()
    }

    pub fn history_limit(&self) -> usize {
        self.inner.history_limit
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.listeners).get(&kind).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("history_limit", &self.inner.history_limit)
            .field("history_len", &lock(&self.inner.history).len())
            .finish_non_exhaustive()
    }
}

/// Handle to one listener registration.
#[derive(Debug)]
#[must_use = "a listener can only be removed through its subscription"]
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes exactly this registration. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut listeners = lock(&bus.listeners);
        if let Some(regs) = listeners.get_mut(&self.kind) {
            regs.retain(|r| r.id != self.id);
            if regs.is_empty() {
                listeners.remove(&self.kind);
            }
        }
    }
}

// Listeners never run under these locks, so a poisoned lock still guards
// consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
