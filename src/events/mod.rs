//! Event Bus Module
//!
//! Decouples producers of data and connectivity changes from the consumers
//! that react to them.

mod bus;
mod event;

pub use bus::{EventBus, Subscription, BROADCAST_CAPACITY, MAX_HISTORY};
pub use event::{Event, EventKind};
