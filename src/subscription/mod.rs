//! Subscription Module
//!
//! Keeps a live change-feed channel per watched resource and reconnects it
//! with exponential backoff, a cooldown after repeated failures, and a
//! stability window that forgives past failures.

mod backoff;
mod manager;
mod refresh;

pub use backoff::{BackoffPolicy, ChannelState, ReconnectMachine, RetryPlan};
pub use manager::{ChannelStatus, StatusCallback, SubscriptionManager};
pub use refresh::Refresher;
