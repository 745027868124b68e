//! Record list panel over the object store's live `Task` results.
//!
//! # Invariants
//! - Every mutation runs inside one `ObjectStore::write` transaction.
//! - The panel never keeps its own copy of the list; `list` and `rows` read
//!   the live results the store keeps current.
//! - A failed create/delete leaves the live view untouched.

use super::view::{RecordPanelView, RecordRow};
use super::PanelError;
use crate::model::record::{Record, RecordId};
use crate::object::{LiveResults, ObjectStore, ObserverToken, StoreError, StoredObject};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const TITLE: &str = "Realm";
const ACTION_LABEL: &str = "Add Realm value";
const DELETE_LABEL: &str = "delete";

pub struct RecordListPanel {
    store: Arc<ObjectStore>,
    records: LiveResults<Record>,
    revision: Arc<AtomicU64>,
    observer: ObserverToken,
    notice: Option<PanelError>,
}

impl RecordListPanel {
    /// Opens the live query and subscribes to it.
    ///
    /// # Errors
    /// - `StorageUnavailable` when the store cannot serve the `Task` query.
    pub fn new(store: Arc<ObjectStore>) -> Result<Self, PanelError> {
        let records = store
            .objects::<Record>()
            .map_err(|err| PanelError::StorageUnavailable(err.to_string()))?;
        let revision = Arc::new(AtomicU64::new(0));
        let bump = Arc::clone(&revision);
        let observer = records.observe(move |_| {
            bump.fetch_add(1, Ordering::SeqCst);
        });

        Ok(Self {
            store,
            records,
            revision,
            observer,
            notice: None,
        })
    }

    /// Creates a record for `value`. Equal values produce distinct records.
    pub fn create(&mut self, value: impl Into<String>) -> Result<RecordId, PanelError> {
        let record = Record::generate(value);
        let id = record.id;
        let result = self.store.write(|tx| tx.insert(&record));
        self.finish("create", result)?;
        info!("event=record_create module=screen status=ok");
        Ok(id)
    }

    /// Deletes the record with `id`.
    ///
    /// Returns `Ok(false)` when no such record exists; the list is unchanged.
    pub fn delete(&mut self, id: RecordId) -> Result<bool, PanelError> {
        let key = id.to_string();
        let result = self
            .store
            .write(|tx| tx.remove_by_key(Record::TYPE_NAME, &key));
        let removed = self.finish("delete", result)?;
        if !removed {
            info!("event=record_delete module=screen status=noop reason=not_found");
        }
        Ok(removed)
    }

    /// Current live contents in insertion order.
    pub fn list(&self) -> Vec<Record> {
        self.records.snapshot()
    }

    pub fn rows(&self) -> Vec<RecordRow> {
        self.records
            .snapshot()
            .into_iter()
            .map(|record| RecordRow {
                id: record.id,
                value: record.value,
                delete_label: DELETE_LABEL.to_string(),
            })
            .collect()
    }

    /// Bumped after each committed change to the list.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn notice(&self) -> Option<String> {
        self.notice.as_ref().map(PanelError::to_string)
    }

    pub fn render(&self) -> RecordPanelView {
        RecordPanelView {
            title: TITLE.to_string(),
            rows: self.rows(),
            action_label: ACTION_LABEL.to_string(),
            notice: self.notice(),
        }
    }

    fn finish<T>(&mut self, op: &'static str, result: Result<T, StoreError>) -> Result<T, PanelError> {
        match result {
            Ok(value) => {
                self.notice = None;
                Ok(value)
            }
            Err(err) => {
                let code = match err {
                    StoreError::TransactionConflict => "transaction_conflict",
                    _ => "write_failed",
                };
                warn!("event=record_{op} module=screen status=error error_code={code} error={err}");
                let error = PanelError::WriteFailure(err.to_string());
                self.notice = Some(error.clone());
                Err(error)
            }
        }
    }
}

impl Drop for RecordListPanel {
    fn drop(&mut self) {
        self.records.unobserve(self.observer);
    }
}
