//! Schema declarations and field values for stored objects.
//!
//! A schema is plain data (name, primary key, typed fields) registered with
//! the store at open time. Types opt in through [`StoredObject`], which maps
//! them to and from an [`ObjectFields`] map.

use super::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Declared type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ObjectId,
    String,
    Int,
    Bool,
    /// Unix epoch milliseconds.
    Date,
}

impl FieldKind {
    fn can_be_primary_key(self) -> bool {
        matches!(self, Self::ObjectId | Self::String)
    }
}

/// One stored field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    ObjectId(Uuid),
    String(String),
    Int(i64),
    Bool(bool),
    Date(i64),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::ObjectId(_) => FieldKind::ObjectId,
            Self::String(_) => FieldKind::String,
            Self::Int(_) => FieldKind::Int,
            Self::Bool(_) => FieldKind::Bool,
            Self::Date(_) => FieldKind::Date,
        }
    }

    pub fn as_object_id(&self) -> Option<Uuid> {
        match self {
            Self::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<i64> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form used as the stored primary key.
    pub(crate) fn key_text(&self) -> Option<String> {
        match self {
            Self::ObjectId(id) => Some(id.to_string()),
            Self::String(value) => Some(value.clone()),
            _ => None,
        }
    }
}

pub type ObjectFields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Data-shape declaration for one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<FieldSpec>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field declaration.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.kind)
    }

    /// Checks the declaration itself.
    ///
    /// # Errors
    /// - Blank type or field names, duplicate field names.
    /// - Primary key missing from `fields` or not `ObjectId`/`String`.
    pub fn validate(&self) -> StoreResult<()> {
        let invalid = |reason: String| StoreError::InvalidSchema {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("type name cannot be blank".to_string()));
        }

        let mut seen = BTreeSet::new();
        for spec in &self.fields {
            if spec.name.trim().is_empty() {
                return Err(invalid("field name cannot be blank".to_string()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate field `{}`", spec.name)));
            }
        }

        match self.field_kind(&self.primary_key) {
            None => Err(invalid(format!(
                "primary key `{}` is not a declared field",
                self.primary_key
            ))),
            Some(kind) if !kind.can_be_primary_key() => Err(invalid(format!(
                "primary key `{}` must be object_id or string",
                self.primary_key
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Validates `fields` against this schema and returns the primary key text.
    ///
    /// Every declared field must be present with its declared kind; undeclared
    /// fields are rejected.
    pub(crate) fn check_fields(&self, fields: &ObjectFields) -> StoreResult<String> {
        for spec in &self.fields {
            match fields.get(&spec.name) {
                None => return Err(StoreError::field(&self.name, &spec.name, "missing")),
                Some(value) if value.kind() != spec.kind => {
                    return Err(StoreError::field(
                        &self.name,
                        &spec.name,
                        format!("expected {:?}, got {:?}", spec.kind, value.kind()),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(extra) = fields.keys().find(|name| self.field_kind(name).is_none()) {
            return Err(StoreError::field(&self.name, extra, "not declared in schema"));
        }

        fields
            .get(&self.primary_key)
            .and_then(FieldValue::key_text)
            .ok_or_else(|| StoreError::field(&self.name, &self.primary_key, "missing"))
    }
}

/// A Rust type persisted through the object store.
pub trait StoredObject: Clone + Send + Sync + 'static {
    /// Registered schema name; must equal `schema().name`.
    const TYPE_NAME: &'static str;

    fn schema() -> ObjectSchema;
    fn to_fields(&self) -> ObjectFields;
    fn from_fields(fields: &ObjectFields) -> StoreResult<Self>;

    /// Primary key in its stored text form.
    fn primary_key(&self) -> StoreResult<String> {
        let schema = Self::schema();
        self.to_fields()
            .get(&schema.primary_key)
            .and_then(FieldValue::key_text)
            .ok_or_else(|| StoreError::field(Self::TYPE_NAME, &schema.primary_key, "missing"))
    }
}

/// Looks up `name` in `fields`, for use in `StoredObject::from_fields`.
pub fn require_field<'a>(
    fields: &'a ObjectFields,
    object_type: &str,
    name: &str,
) -> StoreResult<&'a FieldValue> {
    fields
        .get(name)
        .ok_or_else(|| StoreError::field(object_type, name, "missing"))
}

#[cfg(test)]
mod tests {
    use super::{FieldKind, FieldValue, ObjectFields, ObjectSchema};
    use crate::object::StoreError;

    fn note_schema() -> ObjectSchema {
        ObjectSchema::new("Note", "key")
            .field("key", FieldKind::String)
            .field("pinned", FieldKind::Bool)
    }

    #[test]
    fn validate_rejects_unusable_primary_keys() {
        let missing = ObjectSchema::new("Note", "id").field("body", FieldKind::String);
        assert!(matches!(
            missing.validate(),
            Err(StoreError::InvalidSchema { .. })
        ));

        let numeric = ObjectSchema::new("Note", "id").field("id", FieldKind::Int);
        assert!(numeric.validate().is_err());
        assert!(note_schema().validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_fields() {
        let schema = note_schema().field("pinned", FieldKind::Bool);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn check_fields_reports_kind_mismatch_and_extra_fields() {
        let schema = note_schema();
        let mut fields = ObjectFields::new();
        fields.insert("key".to_string(), FieldValue::String("a".to_string()));
        fields.insert("pinned".to_string(), FieldValue::Int(1));
        assert!(matches!(
            schema.check_fields(&fields),
            Err(StoreError::FieldMismatch { ref field, .. }) if field == "pinned"
        ));

        fields.insert("pinned".to_string(), FieldValue::Bool(true));
        assert_eq!(schema.check_fields(&fields).unwrap(), "a");

        fields.insert("color".to_string(), FieldValue::String("red".to_string()));
        assert!(schema.check_fields(&fields).is_err());
    }

    #[test]
    fn field_values_serialize_with_kind_tags() {
        let json = serde_json::to_string(&FieldValue::Date(42)).unwrap();
        assert_eq!(json, r#"{"kind":"date","value":42}"#);
    }
}
