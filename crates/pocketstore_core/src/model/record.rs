//! Record (`Task`) model.
//!
//! # Responsibility
//! - Define the single entity shown by the record list panel.
//! - Map it to the object store schema.
//!
//! # Invariants
//! - `id` is a fresh UUID v4 per generated record.
//! - `created_at` is captured once, in epoch milliseconds.

use crate::object::{
    require_field, FieldKind, FieldValue, ObjectFields, ObjectSchema, StoreError, StoreResult,
    StoredObject,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type RecordId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub value: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Record {
    /// Builds a new record with a generated id and the current time.
    pub fn generate(value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            value: value.into(),
            created_at: now_epoch_ms(),
        }
    }
}

impl StoredObject for Record {
    const TYPE_NAME: &'static str = "Task";

    fn schema() -> ObjectSchema {
        ObjectSchema::new(Self::TYPE_NAME, "_id")
            .field("_id", FieldKind::ObjectId)
            .field("value", FieldKind::String)
            .field("createdAt", FieldKind::Date)
    }

    fn to_fields(&self) -> ObjectFields {
        ObjectFields::from([
            ("_id".to_string(), FieldValue::ObjectId(self.id)),
            ("value".to_string(), FieldValue::String(self.value.clone())),
            ("createdAt".to_string(), FieldValue::Date(self.created_at)),
        ])
    }

    fn from_fields(fields: &ObjectFields) -> StoreResult<Self> {
        let kind_error = |name: &str| StoreError::field(Self::TYPE_NAME, name, "unexpected kind");

        let id = require_field(fields, Self::TYPE_NAME, "_id")?
            .as_object_id()
            .ok_or_else(|| kind_error("_id"))?;
        let value = require_field(fields, Self::TYPE_NAME, "value")?
            .as_str()
            .ok_or_else(|| kind_error("value"))?
            .to_string();
        let created_at = require_field(fields, Self::TYPE_NAME, "createdAt")?
            .as_date()
            .ok_or_else(|| kind_error("createdAt"))?;

        Ok(Self {
            id,
            value,
            created_at,
        })
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::object::StoredObject;

    #[test]
    fn generate_assigns_distinct_ids_for_equal_values() {
        let first = Record::generate("same");
        let second = Record::generate("same");
        assert_ne!(first.id, second.id);
        assert!(first.created_at > 0);
    }

    #[test]
    fn fields_mapping_matches_registered_schema() {
        let record = Record::generate("abc");
        let fields = record.to_fields();
        assert_eq!(
            Record::schema().check_fields(&fields).unwrap(),
            record.id.to_string()
        );
        assert_eq!(Record::from_fields(&fields).unwrap(), record);
        assert_eq!(record.primary_key().unwrap(), record.id.to_string());
    }
}
