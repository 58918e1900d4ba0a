//! Typed column values and the local record model.
//!
//! The local store is schema-driven: a [`LocalRecord`] carries a field bag of
//! typed [`Value`]s plus per-field "loaded" introspection, mirroring how the
//! CRM side exposes partially hydrated rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::types::LocalId;

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Empty means null, empty text, or empty JSON.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Json(v) => v.is_null(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date_naive()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// One record in the local relational store.
///
/// Tracks which fields have been loaded so callers can distinguish "column is
/// NULL" from "column was never fetched". Reading an unloaded field through
/// [`LocalRecord::try_get`] is an error; [`LocalRecord::get`] returns `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Schema (logical table) this record belongs to.
    pub schema: String,
    /// Persisted identity; `None` until first insert.
    pub id: Option<LocalId>,
    fields: BTreeMap<String, Value>,
    loaded: BTreeSet<String>,
}

impl LocalRecord {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            id: None,
            fields: BTreeMap::new(),
            loaded: BTreeSet::new(),
        }
    }

    pub fn with_id(schema: impl Into<String>, id: LocalId) -> Self {
        let mut rec = Self::new(schema);
        rec.id = Some(id);
        rec
    }

    /// Set a field value, marking it loaded.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.loaded.insert(field.clone());
        self.fields.insert(field, value.into());
    }

    /// Get a loaded field value. `None` when unloaded or NULL.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Get a loaded field value, erroring when the field was never loaded.
    pub fn try_get(&self, field: &str) -> Result<&Value> {
        if !self.is_loaded(field) {
            return Err(CoreError::FieldNotLoaded {
                schema: self.schema.clone(),
                field: field.into(),
            });
        }
        Ok(self.fields.get(field).unwrap_or(&Value::Null))
    }

    /// Whether this column's value has been loaded.
    pub fn is_loaded(&self, field: &str) -> bool {
        self.loaded.contains(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(Value::as_datetime)
    }

    /// Typed text read that distinguishes wrong types from absence.
    pub fn try_text(&self, field: &str) -> Result<&str> {
        match self.try_get(field)? {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(""),
            other => Err(CoreError::TypeMismatch {
                field: field.into(),
                expected: "text",
                got: other.type_name(),
            }),
        }
    }

    /// All loaded fields, in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the record carries its soft-delete flag.
    pub fn is_deleted(&self) -> bool {
        self.bool("deleted").unwrap_or(false)
    }

    /// Default-value initialization applied by stores at insert time.
    ///
    /// Fields already set explicitly are left alone.
    pub fn apply_insert_defaults(&mut self, now: DateTime<Utc>) {
        if !self.is_loaded("deleted") {
            self.set("deleted", false);
        }
        if !self.is_loaded("created_at") {
            self.set("created_at", now);
        }
        if !self.is_loaded("updated_at") {
            self.set("updated_at", now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_field_is_distinguishable() {
        let mut rec = LocalRecord::new("crm.contact");
        rec.set("name", "Ada");

        assert!(rec.is_loaded("name"));
        assert!(!rec.is_loaded("company"));
        assert!(rec.get("company").is_none());
        assert!(matches!(
            rec.try_get("company"),
            Err(CoreError::FieldNotLoaded { .. })
        ));
    }

    #[test]
    fn test_null_is_loaded_but_absent() {
        let mut rec = LocalRecord::new("crm.contact");
        rec.set("company", Value::Null);

        assert!(rec.is_loaded("company"));
        assert!(rec.get("company").is_none());
        assert!(rec.try_get("company").is_ok());
    }

    #[test]
    fn test_type_mismatch() {
        let mut rec = LocalRecord::new("crm.contact");
        rec.set("age", 41i64);

        let err = rec.try_text("age").unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn test_insert_defaults_do_not_clobber() {
        let now = Utc::now();
        let mut rec = LocalRecord::new("crm.contact");
        rec.set("deleted", true);
        rec.apply_insert_defaults(now);

        assert_eq!(rec.bool("deleted"), Some(true));
        assert_eq!(rec.datetime("created_at"), Some(now));
    }

    #[test]
    fn test_value_json_roundtrip() {
        let v = Value::DateTime(Utc::now());
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
