//! Synchronous, observable key-value cache.
//!
//! # Responsibility
//! - Serve reads from memory with no suspension.
//! - Write through to SQLite when a backing file is configured.
//! - Notify subscribers of every value change.
//!
//! # Invariants
//! - A failed write-through leaves the in-memory value unchanged.
//! - Subscribers run after the write is applied and with no cache lock held,
//!   so a callback may read the cache again.
//! - Lock order is `values` before `backing`.

use crate::db::{open_db, DbError};
use log::{debug, info, warn};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub type CacheResult<T> = Result<T, CacheError>;

/// Callback invoked with `(key, new_value)`; `None` means the key was removed.
pub type ValueCallback = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

#[derive(Debug)]
pub enum CacheError {
    Db(DbError),
    Poisoned,
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "cache lock poisoned"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Poisoned => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Handle returned by `subscribe`/`add_listener`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Listener {
    token: SubscriptionToken,
    /// `None` listens to every key.
    key: Option<String>,
    callback: ValueCallback,
}

/// Observable string cache.
pub struct KvCache {
    values: RwLock<HashMap<String, String>>,
    backing: Option<Mutex<Connection>>,
    listeners: RwLock<Vec<Listener>>,
    next_token: AtomicU64,
}

impl KvCache {
    /// Memory-only cache; contents are lost when dropped.
    pub fn in_memory() -> Self {
        Self::build(HashMap::new(), None)
    }

    /// Opens a write-through cache backed by the SQLite file at `path`,
    /// loading every previously persisted entry.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let conn = open_db(path)?;
        let values = {
            let mut stmt = conn.prepare("SELECT key, value FROM kv_cache;")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<HashMap<_, _>, _>>()?
        };
        info!(
            "event=cache_open module=kv status=ok entries={}",
            values.len()
        );
        Ok(Self::build(values, Some(conn)))
    }

    fn build(values: HashMap<String, String>, backing: Option<Connection>) -> Self {
        Self {
            values: RwLock::new(values),
            backing: backing.map(Mutex::new),
            listeners: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let values = self.values.read().map_err(|_| CacheError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    pub fn contains(&self, key: &str) -> CacheResult<bool> {
        let values = self.values.read().map_err(|_| CacheError::Poisoned)?;
        Ok(values.contains_key(key))
    }

    /// Returns every key in ascending order.
    pub fn keys(&self) -> CacheResult<Vec<String>> {
        let values = self.values.read().map_err(|_| CacheError::Poisoned)?;
        let mut keys = values.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        Ok(keys)
    }

    /// Stores `value` under `key` and notifies subscribers.
    ///
    /// Callbacks run after the internal locks are released. With several
    /// concurrent writers, callbacks for the same key may run in a different
    /// order than the writes; the cache itself always holds the last write.
    pub fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        {
            let mut values = self.values.write().map_err(|_| CacheError::Poisoned)?;
            self.persist("set", |conn| {
                conn.execute(
                    "INSERT INTO kv_cache (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                    params![key, value],
                )
            })?;
            values.insert(key.to_string(), value.to_string());
        }
        self.notify(key, Some(value));
        Ok(())
    }

    /// Removes `key`. Returns `false` (and notifies nobody) when it was absent.
    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed = {
            let mut values = self.values.write().map_err(|_| CacheError::Poisoned)?;
            if !values.contains_key(key) {
                return Ok(false);
            }
            self.persist("delete", |conn| {
                conn.execute("DELETE FROM kv_cache WHERE key = ?1;", [key])
            })?;
            values.remove(key).is_some()
        };
        if removed {
            self.notify(key, None);
        }
        Ok(removed)
    }

    /// Removes every key, notifying subscribers once per removed key.
    pub fn clear_all(&self) -> CacheResult<()> {
        let removed = {
            let mut values = self.values.write().map_err(|_| CacheError::Poisoned)?;
            self.persist("clear_all", |conn| conn.execute("DELETE FROM kv_cache;", []))?;
            values.drain().map(|(key, _)| key).collect::<Vec<_>>()
        };
        for key in removed {
            self.notify(&key, None);
        }
        Ok(())
    }

    /// Registers `callback` for changes of one key.
    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&str, Option<&str>) + Send + Sync + 'static,
    ) -> CacheResult<SubscriptionToken> {
        self.register(Some(key.to_string()), Arc::new(callback))
    }

    /// Registers `callback` for changes of any key.
    pub fn add_listener(
        &self,
        callback: impl Fn(&str, Option<&str>) + Send + Sync + 'static,
    ) -> CacheResult<SubscriptionToken> {
        self.register(None, Arc::new(callback))
    }

    /// Removes a subscription. Returns `false` for unknown tokens.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> CacheResult<bool> {
        let mut listeners = self.listeners.write().map_err(|_| CacheError::Poisoned)?;
        let before = listeners.len();
        listeners.retain(|listener| listener.token != token);
        Ok(listeners.len() != before)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    fn register(&self, key: Option<String>, callback: ValueCallback) -> CacheResult<SubscriptionToken> {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().map_err(|_| CacheError::Poisoned)?;
        listeners.push(Listener {
            token,
            key,
            callback,
        });
        Ok(token)
    }

    fn persist(
        &self,
        op: &'static str,
        write: impl FnOnce(&Connection) -> rusqlite::Result<usize>,
    ) -> CacheResult<()> {
        let Some(backing) = self.backing.as_ref() else {
            return Ok(());
        };
        let conn = backing.lock().map_err(|_| CacheError::Poisoned)?;
        if let Err(err) = write(&conn) {
            warn!("event=cache_write module=kv status=error op={op} error={err}");
            return Err(err.into());
        }
        debug!("event=cache_write module=kv status=ok op={op}");
        Ok(())
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        let callbacks = match self.listeners.read() {
            Ok(listeners) => listeners
                .iter()
                .filter(|listener| listener.key.as_deref().map_or(true, |k| k == key))
                .map(|listener| Arc::clone(&listener.callback))
                .collect::<Vec<_>>(),
            Err(_) => {
                warn!("event=cache_notify module=kv status=error error=listeners_poisoned");
                return;
            }
        };
        for callback in callbacks {
            callback(key, value);
        }
    }
}
