//! Generic field-name to scalar records.
//!
//! # Responsibility
//! - Carry write payloads into the gateway and read rows back out of it.
//! - Offer one typed accessor per scalar kind so entity decoders never deal
//!   with raw SQLite values.
//!
//! # Invariants
//! - Field names are unique within a record.
//! - Reads resolve `name` first, then `<mapped_table>_<name>` when a mapped
//!   table is set, matching aliased table projections.

use rusqlite::types::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

/// Field decode errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    MissingField(String),
    UnexpectedNull(String),
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    OutOfRange(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "could not resolve field `{field}`"),
            Self::UnexpectedNull(field) => write!(f, "field `{field}` is null"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field `{field}` holds {found}, expected {expected}"),
            Self::OutOfRange(field) => write!(f, "field `{field}` is out of range"),
        }
    }
}

impl Error for CodecError {}

/// Mapping of field name to scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    mapped_table: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `put`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value);
        self
    }

    /// Sets `name`, returning the previous value.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Exact-name membership; ignores the mapped table.
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Sets the table prefix used as a fallback when resolving field names.
    pub fn set_mapped_table(&mut self, table: impl Into<String>) {
        self.mapped_table = Some(table.into());
    }

    pub fn mapped_table(&self) -> Option<&str> {
        self.mapped_table.as_deref()
    }

    /// Resolves a field by exact name, then by `<mapped_table>_<name>`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value);
        }
        let table = self.mapped_table.as_deref()?;
        self.fields.get(&format!("{table}_{name}"))
    }

    pub fn is_null(&self, name: &str) -> CodecResult<bool> {
        Ok(matches!(self.require(name)?, Value::Null))
    }

    pub fn get_i64(&self, name: &str) -> CodecResult<i64> {
        self.get_i64_opt(name)?
            .ok_or_else(|| CodecError::UnexpectedNull(name.to_string()))
    }

    pub fn get_i64_opt(&self, name: &str) -> CodecResult<Option<i64>> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(*value)),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn get_i32(&self, name: &str) -> CodecResult<i32> {
        self.get_i32_opt(name)?
            .ok_or_else(|| CodecError::UnexpectedNull(name.to_string()))
    }

    pub fn get_i32_opt(&self, name: &str) -> CodecResult<Option<i32>> {
        match self.get_i64_opt(name)? {
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| CodecError::OutOfRange(name.to_string())),
            None => Ok(None),
        }
    }

    pub fn get_bool(&self, name: &str) -> CodecResult<bool> {
        Ok(self.get_i64(name)? != 0)
    }

    pub fn get_f64(&self, name: &str) -> CodecResult<f64> {
        self.get_f64_opt(name)?
            .ok_or_else(|| CodecError::UnexpectedNull(name.to_string()))
    }

    /// Integer storage is widened, since SQLite may store whole reals as
    /// integers.
    pub fn get_f64_opt(&self, name: &str) -> CodecResult<Option<f64>> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Real(value) => Ok(Some(*value)),
            Value::Integer(value) => Ok(Some(*value as f64)),
            other => Err(mismatch(name, "real", other)),
        }
    }

    pub fn get_f32(&self, name: &str) -> CodecResult<f32> {
        Ok(self.get_f64(name)? as f32)
    }

    pub fn get_text(&self, name: &str) -> CodecResult<String> {
        self.get_text_opt(name)?
            .ok_or_else(|| CodecError::UnexpectedNull(name.to_string()))
    }

    pub fn get_text_opt(&self, name: &str) -> CodecResult<Option<String>> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(mismatch(name, "text", other)),
        }
    }

    pub fn get_blob(&self, name: &str) -> CodecResult<Vec<u8>> {
        self.get_blob_opt(name)?
            .ok_or_else(|| CodecError::UnexpectedNull(name.to_string()))
    }

    pub fn get_blob_opt(&self, name: &str) -> CodecResult<Option<Vec<u8>>> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Blob(value) => Ok(Some(value.clone())),
            other => Err(mismatch(name, "blob", other)),
        }
    }

    fn require(&self, name: &str) -> CodecResult<&Value> {
        self.get(name)
            .ok_or_else(|| CodecError::MissingField(name.to_string()))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            mapped_table: None,
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Short storage-class name used in diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}

fn mismatch(field: &str, expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: value_kind(found),
    }
}
