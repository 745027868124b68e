//! SQLite bootstrap shared by every pocketstore collaborator.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the async store, the
//!   observable cache and the object store.
//! - Apply schema migrations before any collaborator touches its tables.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - A connection is never handed out before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The database could not be opened at all.
    Open {
        target: String,
        source: rusqlite::Error,
    },
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
}

impl DbError {
    /// Returns whether SQLite gave up waiting on another writer.
    pub fn is_busy(&self) -> bool {
        let source = match self {
            Self::Open { source, .. } | Self::Sqlite(source) => source,
            Self::UnsupportedSchemaVersion { .. } => return false,
        };
        matches!(
            source.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { target, source } => write!(f, "cannot open {target}: {source}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "storage schema version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Sqlite(source) => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use rusqlite::ffi;

    fn failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn busy_and_locked_count_as_busy() {
        assert!(DbError::Sqlite(failure(ffi::SQLITE_BUSY)).is_busy());
        assert!(DbError::Sqlite(failure(ffi::SQLITE_LOCKED)).is_busy());
        assert!(!DbError::Sqlite(failure(ffi::SQLITE_CONSTRAINT)).is_busy());
        assert!(!DbError::UnsupportedSchemaVersion {
            found: 3,
            supported: 1
        }
        .is_busy());
    }

    #[test]
    fn open_error_names_its_target() {
        let err = DbError::Open {
            target: "/nowhere/x.sqlite3".to_string(),
            source: failure(ffi::SQLITE_CANTOPEN),
        };
        assert!(err.to_string().starts_with("cannot open /nowhere/x.sqlite3"));
    }
}
