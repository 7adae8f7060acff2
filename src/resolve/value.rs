//! Resolved values
//!
//! Derived state owned by the resolver. Raw rows are never touched; a
//! `ResolvedRecord` is a fresh ordered mapping from attribute name to value.

use crate::types::RecordId;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Key of the marker object standing in for an attribute that failed to resolve
pub const UNRESOLVED_KEY: &str = "$unresolved";

/// Outcome of resolving one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// No value rows
    Absent,
    /// Resolution failed and was contained; `kind` names the error
    Unresolved { kind: String },
    /// Plain JSON value (scalars, attachments, module definitions)
    Value(Value),
    /// Ordered sequence
    Sequence(Vec<ResolvedValue>),
    /// Recursively resolved referenced record
    Record(ResolvedRecord),
}

impl ResolvedValue {
    pub fn unresolved(kind: &str) -> Self {
        ResolvedValue::Unresolved {
            kind: kind.to_string(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ResolvedValue::Absent)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ResolvedValue::Unresolved { .. })
    }

    pub fn as_record(&self) -> Option<&ResolvedRecord> {
        match self {
            ResolvedValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ResolvedValue]> {
        match self {
            ResolvedValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Plain JSON form consumed by the differ and the report
    pub fn to_json(&self) -> Value {
        match self {
            ResolvedValue::Absent => Value::Null,
            ResolvedValue::Unresolved { kind } => {
                let mut marker = Map::new();
                marker.insert(UNRESOLVED_KEY.to_string(), Value::String(kind.clone()));
                Value::Object(marker)
            }
            ResolvedValue::Value(value) => value.clone(),
            ResolvedValue::Sequence(items) => {
                Value::Array(items.iter().map(ResolvedValue::to_json).collect())
            }
            ResolvedValue::Record(record) => record.to_json(),
        }
    }
}

impl Serialize for ResolvedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Every attribute of one record, in attribute ordinal order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedRecord {
    record_id: RecordId,
    values: Vec<(String, ResolvedValue)>,
}

impl ResolvedRecord {
    pub fn new(record_id: RecordId) -> Self {
        ResolvedRecord {
            record_id,
            values: Vec::new(),
        }
    }

    /// Store-local id; not part of the compared form
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn push(&mut self, name: impl Into<String>, value: ResolvedValue) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attributes still carrying an unresolved marker, at any depth
    pub fn unresolved_count(&self) -> usize {
        fn count(value: &ResolvedValue) -> usize {
            match value {
                ResolvedValue::Unresolved { .. } => 1,
                ResolvedValue::Sequence(items) => items.iter().map(count).sum(),
                ResolvedValue::Record(record) => record.unresolved_count(),
                _ => 0,
            }
        }
        self.values.iter().map(|(_, v)| count(v)).sum()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl Serialize for ResolvedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
