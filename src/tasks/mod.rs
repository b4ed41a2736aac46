//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the process.
//!
//! # Tasks
//! - TTL Cleanup: Purges expired cache entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
