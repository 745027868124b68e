//! Domain model stored by the object store.
//!
//! # Invariants
//! - Every record is identified by a generated `RecordId` that is never reused.
//! - Records are immutable after creation; deletion removes them outright.

pub mod record;
