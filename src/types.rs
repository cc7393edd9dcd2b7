//! Schema model: column kinds, column descriptors and the single-cell [`Value`] type.
//!
//! A [`Schema`] fixes both the column set and the canonical column order for every
//! [`crate::frame::Frame`] built from it and for every serialized row.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JanitorError, JanitorResult};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Float,
    /// UTF-8 string.
    String,
    /// UTC timestamp.
    Time,
}

impl Kind {
    /// Lowercase name, as used in step descriptions and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Time => "time",
        }
    }

    /// `true` for [`Kind::Int`] and [`Kind::Float`].
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name (case-sensitive, unique within a schema).
    pub name: String,
    /// Column kind.
    pub kind: Kind,
    /// Informational only: every column accepts nulls.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    /// Create a nullable column descriptor.
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }
}

/// Ordered list of uniquely named columns.
///
/// The name→index map is built once here and shared by every frame that uses the schema.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Create a schema. Fails on a duplicate column name.
    pub fn new(columns: Vec<ColumnSchema>) -> JanitorResult<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            if index.insert(c.name.clone(), i).is_some() {
                return Err(JanitorError::SchemaMismatch {
                    message: format!("duplicate column name '{}'", c.name),
                });
            }
        }
        Ok(Self { columns, index })
    }

    /// Columns in canonical order.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// `true` when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns a column descriptor by name, if present.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.index_of(name).map(|i| &self.columns[i])
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// A single cell value, used for cell-level reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// UTC timestamp.
    Time(DateTime<Utc>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Time(_) => "time",
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_duplicate_names() {
        let err = Schema::new(vec![
            ColumnSchema::new("a", Kind::Int),
            ColumnSchema::new("a", Kind::Float),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'a'"));
    }

    #[test]
    fn schema_lookup_is_case_sensitive() {
        let schema = Schema::new(vec![
            ColumnSchema::new("Name", Kind::String),
            ColumnSchema::new("name", Kind::String),
        ])
        .unwrap();
        assert_eq!(schema.index_of("Name"), Some(0));
        assert_eq!(schema.index_of("name"), Some(1));
        assert_eq!(schema.index_of("NAME"), None);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnSchema::new("t", Kind::Time)).unwrap();
        assert_eq!(json, r#"{"name":"t","kind":"time","nullable":true}"#);
        let back: ColumnSchema = serde_json::from_str(r#"{"name":"x","kind":"float"}"#).unwrap();
        assert_eq!(back, ColumnSchema::new("x", Kind::Float));
    }
}
