//! Remote Store Module
//!
//! Interfaces to the hosted data source: row queries, mutations and the
//! per-resource change-feed, plus an in-process implementation of both.

mod memory;
mod traits;
mod types;

pub use memory::InMemoryBackend;
pub use traits::{ChangeFeed, FeedChannel, RemoteStore};
pub use types::{ChangeKind, ChangeNotification, FeedSignal, QueryFilter, Record};
