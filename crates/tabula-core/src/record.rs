#![forbid(unsafe_code)]

//! Field-addressable records.

use std::collections::BTreeMap;

use crate::value::Value;

/// Records whose fields can be read and written by name.
pub trait FieldAccess {
    /// Read a field. Missing fields return `None`.
    fn field(&self, name: &str) -> Option<&Value>;

    /// Write a field, returning `false` if the record rejects it.
    fn set_field(&mut self, name: &str, value: Value) -> bool;
}

/// A generic record: an ordered map of field name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Read a field, nil when missing.
    #[must_use]
    pub fn get(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.fields.get(name).unwrap_or(NULL)
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldAccess for Row {
    fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        self.fields.insert(name.to_owned(), value);
        true
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_as_null() {
        let row = Row::new().with("id", 1);
        assert_eq!(row.get("name"), &Value::Null);
        assert_eq!(row.field("name"), None);
    }

    #[test]
    fn set_field_overwrites() {
        let mut row = Row::new().with("name", "a");
        assert!(row.set_field("name", Value::text("b")));
        assert_eq!(row.get("name"), &Value::text("b"));
    }

    #[test]
    fn collects_from_pairs() {
        let row: Row = [("id", Value::from(1)), ("x", Value::Bool(true))]
            .into_iter()
            .collect();
        assert_eq!(row.len(), 2);
        let names: Vec<_> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["id", "x"]);
    }
}
