//! SQLite-backed object store and its write transactions.

use super::live::{LiveInner, LiveRefresh, LiveResults};
use super::schema::{ObjectFields, ObjectSchema, StoredObject};
use super::{StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

struct LiveEntry {
    view: Weak<dyn LiveRefresh>,
}

/// Embedded object store.
///
/// Open once per process and share through `Arc`.
pub struct ObjectStore {
    conn: Mutex<Connection>,
    schemas: BTreeMap<String, ObjectSchema>,
    live: Mutex<Vec<LiveEntry>>,
}

impl ObjectStore {
    /// Opens (or creates) the store file at `path` and registers `schemas`.
    pub fn open(path: impl AsRef<Path>, schemas: Vec<ObjectSchema>) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?, schemas)
    }

    pub fn open_in_memory(schemas: Vec<ObjectSchema>) -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?, schemas)
    }

    /// Registers `schemas` on a migrated connection.
    ///
    /// # Errors
    /// - `InvalidSchema` for malformed or duplicated declarations.
    /// - `SchemaMismatch` when the file already stores another definition.
    pub fn from_connection(mut conn: Connection, schemas: Vec<ObjectSchema>) -> StoreResult<Self> {
        let mut registered = BTreeMap::new();
        for schema in schemas {
            schema.validate()?;
            if registered.contains_key(&schema.name) {
                return Err(StoreError::InvalidSchema {
                    name: schema.name,
                    reason: "registered twice".to_string(),
                });
            }
            registered.insert(schema.name.clone(), schema);
        }

        let tx = conn.transaction()?;
        for schema in registered.values() {
            register_schema(&tx, schema)?;
        }
        tx.commit()?;

        info!(
            "event=object_store_open module=object status=ok schemas={}",
            registered.len()
        );
        Ok(Self {
            conn: Mutex::new(conn),
            schemas: registered,
            live: Mutex::new(Vec::new()),
        })
    }

    pub fn schema(&self, name: &str) -> Option<&ObjectSchema> {
        self.schemas.get(name)
    }

    /// Runs `work` in one immediate write transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise. After commit,
    /// live results for every touched type are reloaded and their observers
    /// are called once.
    ///
    /// # Deadlocks
    /// The store's connection stays locked while `work` runs. `work` must use
    /// only the [`WriteTransaction`] it is given; calling `write`, `objects`
    /// or `object_for_primary_key` on the same store from inside it blocks
    /// forever. Observers run after the lock is released and may call back
    /// into the store.
    pub fn write<R>(
        &self,
        work: impl FnOnce(&mut WriteTransaction<'_>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let started_at = Instant::now();
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut scope = WriteTransaction {
            tx: &tx,
            schemas: &self.schemas,
            touched: BTreeSet::new(),
        };
        let outcome = work(&mut scope);
        let touched = scope.touched;

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                // Dropping `tx` rolls back.
                drop(tx);
                warn!(
                    "event=object_write module=object status=rolled_back duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };
        tx.commit()?;

        let refreshed = self.reload_live(&conn, &touched);
        drop(conn);

        debug!(
            "event=object_write module=object status=ok touched={} duration_ms={}",
            touched.len(),
            started_at.elapsed().as_millis()
        );
        for view in refreshed {
            view.notify();
        }
        Ok(value)
    }

    /// Opens a live view over every object of type `T`.
    pub fn objects<T: StoredObject>(&self) -> StoreResult<LiveResults<T>> {
        self.require_schema(T::TYPE_NAME)?;
        let conn = self.lock_conn()?;
        let items = load_objects::<T>(&conn)?;
        let results = LiveResults::from_inner(Arc::new(LiveInner::new(items)));

        let mut live = self.live.lock().map_err(|_| StoreError::Poisoned)?;
        live.push(LiveEntry {
            view: Arc::downgrade(&results.as_refresh()),
        });
        Ok(results)
    }

    pub fn object_for_primary_key<T: StoredObject>(&self, key: &str) -> StoreResult<Option<T>> {
        self.require_schema(T::TYPE_NAME)?;
        let conn = self.lock_conn()?;
        find_object::<T>(&conn, key)
    }

    /// Number of live views still registered (dropped views are pruned on write).
    pub fn live_view_count(&self) -> usize {
        self.live
            .lock()
            .map(|live| live.iter().filter(|entry| entry.view.strong_count() > 0).count())
            .unwrap_or(0)
    }

    fn require_schema(&self, name: &str) -> StoreResult<&ObjectSchema> {
        self.schemas
            .get(name)
            .ok_or_else(|| StoreError::UnknownObjectType(name.to_string()))
    }

    fn lock_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn reload_live(
        &self,
        conn: &Connection,
        touched: &BTreeSet<String>,
    ) -> Vec<Arc<dyn LiveRefresh>> {
        if touched.is_empty() {
            return Vec::new();
        }
        let mut live = match self.live.lock() {
            Ok(live) => live,
            Err(_) => {
                error!("event=live_reload module=object status=error error=registry_poisoned");
                return Vec::new();
            }
        };
        live.retain(|entry| entry.view.strong_count() > 0);

        let mut refreshed = Vec::new();
        for view in live.iter().filter_map(|entry| entry.view.upgrade()) {
            if !touched.contains(view.object_type()) {
                continue;
            }
            match view.reload(conn) {
                Ok(()) => refreshed.push(view),
                Err(err) => error!(
                    "event=live_reload module=object status=error object_type={} error={err}",
                    view.object_type()
                ),
            }
        }
        refreshed
    }
}

/// Mutation scope handed to [`ObjectStore::write`].
pub struct WriteTransaction<'a> {
    tx: &'a Transaction<'a>,
    schemas: &'a BTreeMap<String, ObjectSchema>,
    touched: BTreeSet<String>,
}

impl<'a> WriteTransaction<'a> {
    /// Inserts a typed object.
    pub fn insert<T: StoredObject>(&mut self, object: &T) -> StoreResult<()> {
        self.insert_fields(T::TYPE_NAME, object.to_fields())?;
        Ok(())
    }

    /// Inserts raw fields for `object_type`; returns the primary key text.
    ///
    /// # Errors
    /// - `UnknownObjectType`, `FieldMismatch` on schema violations.
    /// - `DuplicatePrimaryKey` when the key is already live.
    pub fn insert_fields(
        &mut self,
        object_type: &str,
        fields: ObjectFields,
    ) -> StoreResult<String> {
        let (name, schema) = self.registered(object_type)?;
        let key = schema.check_fields(&fields)?;
        let payload = serde_json::to_string(&fields)
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;

        let inserted = self.tx.execute(
            "INSERT INTO objects (object_type, primary_key, fields) VALUES (?1, ?2, ?3);",
            params![name, key.as_str(), payload],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicatePrimaryKey {
                    object_type: name.to_string(),
                    key,
                });
            }
            Err(err) => return Err(err.into()),
        }

        self.touch(name);
        Ok(key)
    }

    /// Removes a typed object by its primary key. Returns `false` when absent.
    pub fn remove<T: StoredObject>(&mut self, object: &T) -> StoreResult<bool> {
        let key = object.primary_key()?;
        self.remove_by_key(T::TYPE_NAME, &key)
    }

    /// Removes by primary key text. Returns `false` when absent.
    pub fn remove_by_key(&mut self, object_type: &str, key: &str) -> StoreResult<bool> {
        let (name, _) = self.registered(object_type)?;
        let changed = self.tx.execute(
            "DELETE FROM objects WHERE object_type = ?1 AND primary_key = ?2;",
            params![name, key],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        self.touch(name);
        Ok(true)
    }

    /// Reads inside the transaction, seeing its uncommitted writes.
    pub fn object_for_primary_key<T: StoredObject>(&self, key: &str) -> StoreResult<Option<T>> {
        self.registered(T::TYPE_NAME)?;
        find_object::<T>(self.tx, key)
    }

    fn registered(&self, object_type: &str) -> StoreResult<(&'a str, &'a ObjectSchema)> {
        self.schemas
            .get_key_value(object_type)
            .map(|(name, schema)| (name.as_str(), schema))
            .ok_or_else(|| StoreError::UnknownObjectType(object_type.to_string()))
    }

    fn touch(&mut self, name: &str) {
        if !self.touched.contains(name) {
            self.touched.insert(name.to_string());
        }
    }
}

pub(crate) fn load_objects<T: StoredObject>(conn: &Connection) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(
        "SELECT fields FROM objects
         WHERE object_type = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([T::TYPE_NAME])?;
    let mut objects = Vec::new();
    while let Some(row) = rows.next()? {
        let payload: String = row.get(0)?;
        objects.push(decode_object::<T>(&payload)?);
    }
    Ok(objects)
}

fn find_object<T: StoredObject>(conn: &Connection, key: &str) -> StoreResult<Option<T>> {
    let payload = conn
        .query_row(
            "SELECT fields FROM objects WHERE object_type = ?1 AND primary_key = ?2;",
            params![T::TYPE_NAME, key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    payload.map(|payload| decode_object::<T>(&payload)).transpose()
}

fn decode_object<T: StoredObject>(payload: &str) -> StoreResult<T> {
    let fields: ObjectFields = serde_json::from_str(payload).map_err(|err| {
        StoreError::InvalidData(format!("{} fields are not valid json: {err}", T::TYPE_NAME))
    })?;
    T::from_fields(&fields)
}

fn register_schema(tx: &Transaction<'_>, schema: &ObjectSchema) -> StoreResult<()> {
    let stored = tx
        .query_row(
            "SELECT definition FROM object_schemas WHERE name = ?1;",
            [schema.name.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    if let Some(definition) = stored {
        let existing: ObjectSchema = serde_json::from_str(&definition).map_err(|err| {
            StoreError::InvalidData(format!("stored schema `{}`: {err}", schema.name))
        })?;
        if existing != *schema {
            return Err(StoreError::SchemaMismatch {
                name: schema.name.clone(),
            });
        }
        return Ok(());
    }

    let definition = serde_json::to_string(schema)
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;
    tx.execute(
        "INSERT INTO object_schemas (name, definition) VALUES (?1, ?2);",
        params![schema.name.as_str(), definition],
    )?;
    Ok(())
}
