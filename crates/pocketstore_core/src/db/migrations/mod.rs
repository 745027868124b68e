//! Ordered schema steps for every pocketstore database file.
//!
//! All three collaborators share one schema so a single file could host them;
//! each only touches its own tables.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly 1.
//! - `PRAGMA user_version` always equals the last applied step.
//! - Pending steps run in one transaction; a failed step applies nothing.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

const STEPS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Schema position of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current: u32,
    pub latest: u32,
}

impl MigrationStatus {
    pub fn pending(&self) -> u32 {
        self.latest.saturating_sub(self.current)
    }
}

/// Last schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

pub fn migration_status(conn: &Connection) -> DbResult<MigrationStatus> {
    let current = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(MigrationStatus {
        current,
        latest: latest_version(),
    })
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationStatus> {
    let status = migration_status(conn)?;
    if status.current > status.latest {
        return Err(DbError::UnsupportedSchemaVersion {
            found: status.current,
            supported: status.latest,
        });
    }
    if status.pending() == 0 {
        return Ok(status);
    }

    let tx = conn.transaction()?;
    for (version, sql) in STEPS.iter().skip(status.current as usize) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        status.current, status.latest
    );
    Ok(MigrationStatus {
        current: status.latest,
        latest: status.latest,
    })
}

#[cfg(test)]
mod tests {
    use super::{latest_version, STEPS};

    #[test]
    fn step_versions_are_contiguous_from_one() {
        for (index, (version, sql)) in STEPS.iter().enumerate() {
            assert_eq!(*version as usize, index + 1);
            assert!(!sql.trim().is_empty());
        }
        assert_eq!(latest_version() as usize, STEPS.len());
    }
}
