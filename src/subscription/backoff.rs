//! Reconnect policy and the explicit channel state machine.
//!
//! Everything here is pure: no timers, no I/O. The manager's driver task
//! arms the timers these transitions ask for.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, SyncError};

/// Lifecycle of one change-feed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Subscribed,
    Failed,
}

/// Exponential backoff with a ceiling, an attempt limit and a stability window.
///
/// Only constructed through [`BackoffPolicy::new`] or `Default`, so every
/// retry waits a non-zero delay and the cooldown is never shorter than the
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    /// Consecutive failures retried with backoff before a cooldown
    max_attempts: u32,
    /// Time a channel must stay subscribed before the attempt count resets
    stability_window: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            stability_window: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// # Errors
    /// `InvalidPolicy` when `base_delay` is zero, `max_delay` is below
    /// `base_delay`, or `max_attempts` is zero.
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
        stability_window: Duration,
    ) -> Result<Self> {
        if base_delay.is_zero() {
            return Err(SyncError::InvalidPolicy(
                "base delay must be at least 1ms".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(SyncError::InvalidPolicy(format!(
                "max delay {}ms is below base delay {}ms",
                max_delay.as_millis(),
                base_delay.as_millis()
            )));
        }
        if max_attempts == 0 {
            return Err(SyncError::InvalidPolicy(
                "max attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_delay,
            max_delay,
            max_attempts,
            stability_window,
        })
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn stability_window(&self) -> Duration {
        self.stability_window
    }

    /// `min(base_delay * 2^attempt, max_delay)`, no jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Pause taken once `max_attempts` is exhausted.
    pub fn cooldown(&self) -> Duration {
        self.max_delay.saturating_mul(2)
    }
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPlan {
    /// Regular retry; `attempt` is the attempt count after this failure.
    Backoff { attempt: u32, delay: Duration },
    /// Attempt ceiling reached; the count resets when the cooldown ends.
    Cooldown { delay: Duration },
}

impl RetryPlan {
    pub fn delay(&self) -> Duration {
        match self {
            RetryPlan::Backoff { delay, .. } | RetryPlan::Cooldown { delay } => *delay,
        }
    }
}

/// Channel state plus the consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    policy: BackoffPolicy,
    state: ChannelState,
    attempt_count: u32,
}

impl ReconnectMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: ChannelState::Disconnected,
            attempt_count: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Disconnected -> Connecting. Returns false from any other state.
    pub fn start(&mut self) -> bool {
        if self.state != ChannelState::Disconnected {
            return false;
        }
        self.state = ChannelState::Connecting;
        true
    }

    /// Connecting -> Subscribed. Returns the stability window to arm.
    ///
    /// The attempt count is left alone until the window elapses.
    pub fn on_subscribed(&mut self) -> Option<Duration> {
        if self.state != ChannelState::Connecting {
            return None;
        }
        self.state = ChannelState::Subscribed;
        Some(self.policy.stability_window)
    }

    /// Stability window elapsed. Resets the attempt count while still subscribed.
    pub fn on_stable(&mut self) -> bool {
        if self.state != ChannelState::Subscribed {
            return false;
        }
        self.attempt_count = 0;
        true
    }

    /// Connecting/Subscribed -> Failed, returning the retry to schedule.
    ///
    /// Returns `None` when there is no live attempt to fail, e.g. after `stop`.
    pub fn on_failure(&mut self) -> Option<RetryPlan> {
        if !matches!(self.state, ChannelState::Connecting | ChannelState::Subscribed) {
            return None;
        }
        self.state = ChannelState::Failed;

        if self.attempt_count < self.policy.max_attempts {
            let delay = self.policy.delay_for(self.attempt_count);
            self.attempt_count += 1;
            Some(RetryPlan::Backoff {
                attempt: self.attempt_count,
                delay,
            })
        } else {
            Some(RetryPlan::Cooldown {
                delay: self.policy.cooldown(),
            })
        }
    }

    /// Reconnect timer fired: Failed -> Connecting.
    pub fn on_retry_timer(&mut self, plan: RetryPlan) -> bool {
        if self.state != ChannelState::Failed {
            return false;
        }
        if let RetryPlan::Cooldown { .. } = plan {
            self.attempt_count = 0;
        }
        self.state = ChannelState::Connecting;
        true
    }

    /// Any state -> Disconnected.
    pub fn stop(&mut self) {
        self.state = ChannelState::Disconnected;
    }
}
