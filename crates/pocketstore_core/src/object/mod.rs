//! Embedded object store with schema registration and live queries.
//!
//! # Responsibility
//! - Persist schema-described objects in SQLite.
//! - Run every mutation inside one scoped write transaction.
//! - Keep live result sets current and notify their observers.
//!
//! # Invariants
//! - Objects of one type are unique by primary key.
//! - Nothing written inside a failed transaction becomes visible.
//! - Live results are refreshed before observers run, and observers run
//!   with no store lock held.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod live;
mod schema;
mod store;

pub use live::{LiveResults, ObserverToken};
pub use schema::{
    require_field, FieldKind, FieldSpec, FieldValue, ObjectFields, ObjectSchema, StoredObject,
};
pub use store::{ObjectStore, WriteTransaction};

pub type StoreResult<T> = Result<T, StoreError>;

/// Object store error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// A schema declaration is malformed.
    InvalidSchema { name: String, reason: String },
    /// The file already holds a different definition for this type.
    SchemaMismatch { name: String },
    UnknownObjectType(String),
    /// Field set does not match the registered schema.
    FieldMismatch {
        object_type: String,
        field: String,
        reason: String,
    },
    DuplicatePrimaryKey { object_type: String, key: String },
    /// Another writer held the database past the busy timeout.
    TransactionConflict,
    InvalidData(String),
    Poisoned,
}

impl StoreError {
    pub(crate) fn field(
        object_type: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::FieldMismatch {
            object_type: object_type.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidSchema { name, reason } => {
                write!(f, "invalid schema `{name}`: {reason}")
            }
            Self::SchemaMismatch { name } => write!(
                f,
                "schema `{name}` differs from the definition stored in this database"
            ),
            Self::UnknownObjectType(name) => write!(f, "object type not registered: {name}"),
            Self::FieldMismatch {
                object_type,
                field,
                reason,
            } => write!(f, "{object_type}.{field}: {reason}"),
            Self::DuplicatePrimaryKey { object_type, key } => {
                write!(f, "{object_type} with primary key {key} already exists")
            }
            Self::TransactionConflict => {
                write!(f, "write transaction conflicted with another writer")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
            Self::Poisoned => write!(f, "object store lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        if value.is_busy() {
            return Self::TransactionConflict;
        }
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}
