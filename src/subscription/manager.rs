//! Resilient Subscription Manager
//!
//! Owns one live change-feed channel for a resource, reconnects it with
//! backoff, and turns every change notification into a bus event plus an
//! independent refresh.

use std::future::pending;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn};

use super::{BackoffPolicy, ChannelState, ReconnectMachine, Refresher, RetryPlan};
use crate::error::{Result, SyncError};
use crate::events::{EventBus, EventKind};
use crate::feed::{ChangeFeed, ChangeNotification, FeedChannel, FeedSignal};

/// Snapshot of a subscription channel, also handed to the state-change callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub resource: String,
    pub state: ChannelState,
    pub attempt_count: u32,
    pub reconnect_pending: bool,
    pub stability_pending: bool,
    /// Delay of the pending reconnect, if any
    pub retry_in_ms: Option<u64>,
}

impl ChannelStatus {
    fn idle(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            state: ChannelState::Disconnected,
            attempt_count: 0,
            reconnect_pending: false,
            stability_pending: false,
            retry_in_ms: None,
        }
    }
}

pub type StatusCallback = Arc<dyn Fn(&ChannelStatus) + Send + Sync>;

struct Shared {
    /// Bumped on every start and stop; refreshes carry the value they started under
    generation: AtomicU64,
    /// Held while a refresh result is applied and while `stop` invalidates
    apply_gate: AsyncMutex<()>,
    status: Mutex<ChannelStatus>,
}

struct DriverHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Keeps one resource's change-feed subscribed.
///
/// Connectivity failures are retried forever (backoff, then cooldown) and
/// only surface as bus events and status callbacks. `stop` is the only
/// terminal transition.
pub struct SubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    bus: EventBus,
    policy: BackoffPolicy,
    shared: Arc<Shared>,
    driver: Mutex<Option<DriverHandle>>,
}

impl SubscriptionManager {
    pub fn new(feed: Arc<dyn ChangeFeed>, bus: EventBus, policy: BackoffPolicy) -> Self {
        Self {
            feed,
            bus,
            policy,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                apply_gate: AsyncMutex::new(()),
                status: Mutex::new(ChannelStatus::idle("")),
            }),
            driver: Mutex::new(None),
        }
    }

    /// Starts watching `resource`.
    ///
    /// `on_change` runs for every change notification; `on_state_change`
    /// receives a status snapshot on every channel transition. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    /// `AlreadyRunning` if this manager is already watching a resource.
    pub fn start<R, F>(&self, resource: impl Into<String>, on_change: Arc<R>, on_state_change: F) -> Result<()>
    where
        R: Refresher,
        F: Fn(&ChannelStatus) + Send + Sync + 'static,
    {
        let resource = resource.into();
        let mut slot = lock(&self.driver);
        if slot.is_some() {
            return Err(SyncError::AlreadyRunning(lock(&self.shared.status).resource.clone()));
        }

        let token = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.shared.status) = ChannelStatus::idle(resource.clone());

        let (shutdown, shutdown_rx) = oneshot::channel();
        let driver = Driver {
            resource: resource.clone(),
            feed: Arc::clone(&self.feed),
            bus: self.bus.clone(),
            machine: ReconnectMachine::new(self.policy),
            shared: Arc::clone(&self.shared),
            token,
            refresher: on_change,
            on_status: Arc::new(on_state_change),
            had_failure: false,
        };

        info!(resource = %resource, "Starting change-feed subscription");
        let task = tokio::spawn(driver.run(shutdown_rx));
        *slot = Some(DriverHandle { shutdown, task });
        Ok(())
    }

    /// Tears the subscription down.
    ///
    /// Pending timers are cancelled before the channel is released. Refresh
    /// results that arrive afterwards are discarded. Calling `stop` on a
    /// stopped manager does nothing.
    pub async fn stop(&self) {
        let driver = lock(&self.driver).take();
        let Some(driver) = driver else {
            return;
        };

        {
            let _gate = self.shared.apply_gate.lock().await;
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }

        // The driver may already be gone if its runtime shut down.
        let _ = driver.shutdown.send(());
        if let Err(err) = driver.task.await {
            warn!(error = %err, "Subscription driver ended abnormally");
        }

        let resource = {
            let mut status = lock(&self.shared.status);
            status.state = ChannelState::Disconnected;
            status.reconnect_pending = false;
            status.stability_pending = false;
            status.retry_in_ms = None;
            status.resource.clone()
        };
        info!(resource = %resource, "Change-feed subscription stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.driver).is_some()
    }

    pub fn status(&self) -> ChannelStatus {
        lock(&self.shared.status).clone()
    }

    /// Whether a reconnect or stability timer is armed.
    pub fn has_pending_timers(&self) -> bool {
        let status = lock(&self.shared.status);
        status.reconnect_pending || status.stability_pending
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        let driver = self.driver.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(driver) = driver {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            let _ = driver.shutdown.send(());
        }
    }
}

enum Exit {
    Shutdown,
    Failed(String),
}

struct Driver<R: Refresher> {
    resource: String,
    feed: Arc<dyn ChangeFeed>,
    bus: EventBus,
    machine: ReconnectMachine,
    shared: Arc<Shared>,
    token: u64,
    refresher: Arc<R>,
    on_status: StatusCallback,
    had_failure: bool,
}

impl<R: Refresher> Driver<R> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        self.machine.start();
        self.report(None, false);

        loop {
            let connected = self.connect(&mut shutdown).await;
            let exit = match connected {
                Ok(Some(mut channel)) => {
                    let exit = self.pump(channel.as_mut(), &mut shutdown).await;
                    channel.release().await;
                    exit
                }
                Ok(None) => Exit::Shutdown,
                Err(err) => Exit::Failed(err.to_string()),
            };

            let reason = match exit {
                Exit::Shutdown => break,
                Exit::Failed(reason) => reason,
            };
            let Some(plan) = self.machine.on_failure() else {
                break;
            };
            self.announce_failure(&reason, plan);

            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(plan.delay()) => {
                    self.machine.on_retry_timer(plan);
                    debug!(resource = %self.resource, attempt = self.machine.attempt_count(), "Reconnecting change-feed");
                    self.report(None, false);
                }
            }
        }

        self.machine.stop();
        self.report(None, false);
    }

    async fn connect(&self, shutdown: &mut oneshot::Receiver<()>) -> Result<Option<Box<dyn FeedChannel>>> {
        let mut open = self.feed.open(&self.resource);
        tokio::select! {
            result = &mut open => result.map(Some),
            _ = shutdown => {
                // Opening is not cancelled; a channel that still arrives is released.
                if let Ok(mut channel) = open.await {
                    channel.release().await;
                }
                Ok(None)
            }
        }
    }

    async fn pump(&mut self, channel: &mut dyn FeedChannel, shutdown: &mut oneshot::Receiver<()>) -> Exit {
        let mut stability: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    if stability.take().is_some() {
                        self.report(None, false);
                    }
                    return Exit::Shutdown;
                }
                _ = wait_for(&mut stability) => {
                    stability = None;
                    if self.machine.on_stable() {
                        info!(resource = %self.resource, "Change-feed stable, attempt count reset");
                    }
                    self.report(None, false);
                }
                signal = channel.next_signal() => match signal {
                    FeedSignal::Subscribed => {
                        if let Some(window) = self.machine.on_subscribed() {
                            stability = Some(Box::pin(sleep(window)));
                            info!(
                                resource = %self.resource,
                                attempt = self.machine.attempt_count(),
                                "Change-feed subscribed"
                            );
                            if std::mem::take(&mut self.had_failure) {
                                self.bus.publish(
                                    EventKind::ConnectionRestored,
                                    json!({ "resource": self.resource }),
                                );
                            }
                            self.report(None, true);
                        }
                    }
                    FeedSignal::Change(change) => self.on_change(change),
                    FeedSignal::Error(reason) => return Exit::Failed(reason),
                    FeedSignal::Closed => return Exit::Failed("channel closed".to_string()),
                }
            }
        }
    }

    fn on_change(&self, change: ChangeNotification) {
        if self.machine.state() != ChannelState::Subscribed {
            debug!(resource = %self.resource, "Ignoring change received before acknowledgment");
            return;
        }
        debug!(
            resource = %self.resource,
            change = ?change.kind,
            id = ?change.record_id(),
            "Change notification received"
        );
        self.bus.publish(change.kind.event_kind(), change.event_payload());

        let refresher = Arc::clone(&self.refresher);
        let shared = Arc::clone(&self.shared);
        let bus = self.bus.clone();
        let token = self.token;

        tokio::spawn(async move {
            match refresher.refresh(&change).await {
                Ok(output) => {
                    let _gate = shared.apply_gate.lock().await;
                    if shared.generation.load(Ordering::SeqCst) != token {
                        debug!(resource = %change.resource, "Discarding refresh result of a stopped subscription");
                        return;
                    }
                    refresher.apply(output).await;
                }
                Err(err) => {
                    warn!(resource = %change.resource, error = %err, "Refresh failed");
                    bus.publish(
                        EventKind::RefreshFailed,
                        json!({
                            "resource": change.resource,
                            "id": change.record_id(),
                            "error": err.to_string(),
                        }),
                    );
                }
            }
        });
    }

    fn announce_failure(&mut self, reason: &str, plan: RetryPlan) {
        self.had_failure = true;
        let delay_ms = plan.delay().as_millis() as u64;

        self.bus.publish(
            EventKind::ConnectionLost,
            json!({
                "resource": self.resource,
                "reason": reason,
                "attempt": self.machine.attempt_count(),
                "retry_in_ms": delay_ms,
            }),
        );

        match plan {
            RetryPlan::Backoff { attempt, .. } => {
                warn!(resource = %self.resource, attempt, delay_ms, reason, "Change-feed lost, retrying");
            }
            RetryPlan::Cooldown { .. } => {
                warn!(resource = %self.resource, delay_ms, reason, "Reconnect attempts exhausted, cooling down");
                self.bus.publish(
                    EventKind::ConnectionUnstable,
                    json!({
                        "resource": self.resource,
                        "attempts": self.machine.attempt_count(),
                        "cooldown_ms": delay_ms,
                    }),
                );
            }
        }

        self.report(Some(plan.delay()), false);
    }

    fn report(&self, retry_in: Option<Duration>, stability_pending: bool) {
        let status = ChannelStatus {
            resource: self.resource.clone(),
            state: self.machine.state(),
            attempt_count: self.machine.attempt_count(),
            reconnect_pending: retry_in.is_some(),
            stability_pending,
            retry_in_ms: retry_in.map(|d| d.as_millis() as u64),
        };
        *lock(&self.shared.status) = status.clone();

        if catch_unwind(AssertUnwindSafe(|| (self.on_status)(&status))).is_err() {
            error!(resource = %self.resource, "Subscription state callback panicked");
        }
    }
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::InMemoryBackend;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Refresher for Noop {
        type Output = ();

        async fn refresh(&self, _change: &ChangeNotification) -> Result<()> {
            Ok(())
        }

        async fn apply(&self, _output: ()) {}
    }

    fn manager(backend: &InMemoryBackend) -> SubscriptionManager {
        SubscriptionManager::new(Arc::new(backend.clone()), EventBus::new(), BackoffPolicy::default())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_subscribes() {
        let backend = InMemoryBackend::new();
        let manager = manager(&backend);

        manager.start("calls", Arc::new(Noop), |_| {}).unwrap();
        settle().await;

        let status = manager.status();
        assert_eq!(status.resource, "calls");
        assert_eq!(status.state, ChannelState::Subscribed);
        assert!(status.stability_pending);
        assert_eq!(backend.open_channels("calls"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let backend = InMemoryBackend::new();
        let manager = manager(&backend);

        manager.start("calls", Arc::new(Noop), |_| {}).unwrap();
        let err = manager.start("reps", Arc::new(Noop), |_| {}).unwrap_err();

        assert_eq!(err, SyncError::AlreadyRunning("calls".to_string()));
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let backend = InMemoryBackend::new();
        let manager = manager(&backend);

        manager.stop().await;
        manager.start("calls", Arc::new(Noop), |_| {}).unwrap();
        settle().await;

        manager.stop().await;
        manager.stop().await;

        assert!(!manager.is_running());
        assert!(!manager.has_pending_timers());
        assert_eq!(manager.status().state, ChannelState::Disconnected);
        assert_eq!(backend.open_channels("calls"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let backend = InMemoryBackend::new();
        let manager = manager(&backend);

        manager.start("calls", Arc::new(Noop), |_| {}).unwrap();
        settle().await;
        manager.stop().await;
        manager.start("reps", Arc::new(Noop), |_| {}).unwrap();
        settle().await;

        assert_eq!(manager.status().resource, "reps");
        assert_eq!(manager.status().state, ChannelState::Subscribed);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_status_callback_does_not_kill_driver() {
        let backend = InMemoryBackend::new();
        let manager = manager(&backend);

        manager
            .start("calls", Arc::new(Noop), |_| panic!("callback failure"))
            .unwrap();
        settle().await;

        assert_eq!(manager.status().state, ChannelState::Subscribed);
        manager.stop().await;
    }
}
