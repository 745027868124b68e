//! Core of the pocketstore screen.
//!
//! Three storage collaborators (an async key-value store, an observable
//! key-value cache and an embedded object store) and the headless screen
//! model that wires one panel to each of them.

pub mod config;
pub mod db;
pub mod kv;
pub mod logging;
pub mod model;
pub mod object;
pub mod screen;

pub use config::AppConfig;
pub use kv::{AsyncKvStore, KvCache, MemoryAsyncKv, SqliteAsyncKv};
pub use logging::{
    default_log_level, init_logging, logging_status, LoggingError, LoggingStatus,
};
pub use model::record::{Record, RecordId};
pub use object::{LiveResults, ObjectSchema, ObjectStore, StoreError, StoredObject};
pub use screen::{
    random_value, ActionOutcome, PanelError, Screen, ScreenAction, ScreenView, Stores,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
