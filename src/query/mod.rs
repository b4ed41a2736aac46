//! Query Module
//!
//! Data-access hooks that read through the bounded cache and refresh it from
//! the change-feed.

mod hook;

pub use hook::QueryHook;
