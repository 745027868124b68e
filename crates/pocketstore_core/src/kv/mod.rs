//! Scalar key-value collaborators.
//!
//! # Responsibility
//! - `async_store`: asynchronous get/set store for the async scalar panel.
//! - `cache`: synchronous observable cache for the observable scalar panel.
//!
//! # Invariants
//! - Both stores hold plain strings; last write wins per key.

pub mod async_store;
pub mod cache;

pub use async_store::{AsyncKvStore, KvError, KvResult, MemoryAsyncKv, SqliteAsyncKv};
pub use cache::{CacheError, CacheResult, KvCache, SubscriptionToken, ValueCallback};
