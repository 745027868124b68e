//! Asynchronous string key-value store.
//!
//! # Responsibility
//! - Define the async get/set contract consumed by the async scalar panel.
//! - Provide an in-memory and a SQLite-backed implementation.
//!
//! # Invariants
//! - Last write wins per key.
//! - `multi_set` applies all pairs or none.
//! - SQLite work never runs on the caller's task; it is moved to the
//!   blocking pool so callers only suspend.

use crate::db::{open_db, open_db_in_memory, DbError};
use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

pub type KvResult<T> = Result<T, KvError>;

/// Error returned by async store operations.
#[derive(Debug)]
pub enum KvError {
    Db(DbError),
    /// The blocking worker running the operation panicked or was cancelled.
    Worker(String),
    Poisoned,
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Worker(message) => write!(f, "async store worker failed: {message}"),
            Self::Poisoned => write!(f, "async store connection lock poisoned"),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Worker(_) | Self::Poisoned => None,
        }
    }
}

impl From<DbError> for KvError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Async key-value contract.
#[async_trait]
pub trait AsyncKvStore: Send + Sync {
    /// Returns the stored value, or `None` when the key was never written.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;
    async fn remove(&self, key: &str) -> KvResult<()>;
    /// Returns every stored key in ascending order.
    async fn all_keys(&self) -> KvResult<Vec<String>>;
    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()>;
    async fn clear(&self) -> KvResult<()>;

    /// Returns `(key, value)` pairs in the order of `keys`.
    async fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>> {
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            pairs.push((key.clone(), self.get(key).await?));
        }
        Ok(pairs)
    }
}

/// In-memory async store.
#[derive(Debug, Default)]
pub struct MemoryAsyncKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryAsyncKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsyncKvStore for MemoryAsyncKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> KvResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn all_keys(&self) -> KvResult<Vec<String>> {
        let mut keys = self
            .entries
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        keys.sort();
        Ok(keys)
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> KvResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// SQLite-backed async store (`async_kv` table).
#[derive(Debug, Clone)]
pub struct SqliteAsyncKv {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAsyncKv {
    /// Opens (or creates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> KvResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already has migrations applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn run<T, F>(&self, op: &'static str, work: F) -> KvResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> KvResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| KvError::Poisoned)?;
            work(&mut guard)
        })
        .await
        .map_err(|err| KvError::Worker(err.to_string()))
        .and_then(|inner| inner);

        match &result {
            Ok(_) => debug!("event=async_kv module=kv status=ok op={op}"),
            Err(err) => warn!("event=async_kv module=kv status=error op={op} error={err}"),
        }
        result
    }
}

#[async_trait]
impl AsyncKvStore for SqliteAsyncKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let key = key.to_string();
        self.run("get", move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM async_kv WHERE key = ?1;",
                    [key.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run("set", move |conn| {
            upsert(conn, &key, &value)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> KvResult<()> {
        let key = key.to_string();
        self.run("remove", move |conn| {
            conn.execute("DELETE FROM async_kv WHERE key = ?1;", [key.as_str()])?;
            Ok(())
        })
        .await
    }

    async fn all_keys(&self) -> KvResult<Vec<String>> {
        self.run("all_keys", |conn| {
            let mut stmt = conn.prepare("SELECT key FROM async_kv ORDER BY key ASC;")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
        let entries = entries.to_vec();
        self.run("multi_set", move |conn| {
            let tx = conn.transaction()?;
            for (key, value) in &entries {
                upsert(&tx, key, value)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> KvResult<()> {
        self.run("clear", |conn| {
            conn.execute("DELETE FROM async_kv;", [])?;
            Ok(())
        })
        .await
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO async_kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![key, value],
    )
}
