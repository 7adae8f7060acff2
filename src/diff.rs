//! Structural Diff
//!
//! Deep comparison of two JSON documents. Mappings are compared key by key,
//! sequences position by position, everything else by value. Output keys
//! follow traversal order: keys only in the source, then keys only in the
//! target, then differing common keys in source order.
//!
//! A sequence is reported as one entry under its owning key. When the first
//! differing element is itself a container, the entry is that element's
//! nested difference; otherwise the entry is a leaf holding both whole
//! sequences.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Key ignored by default at every depth
pub const MODIFIED_KEY: &str = "modified";

/// Both sides of a differing value; a missing side is `null`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafDifference {
    pub source_value: Value,
    pub target_value: Value,
}

/// Difference under one key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Difference {
    Leaf(LeafDifference),
    Nested(DiffNode),
}

impl Difference {
    pub fn leaf(source_value: Value, target_value: Value) -> Self {
        Difference::Leaf(LeafDifference {
            source_value,
            target_value,
        })
    }

    pub fn as_leaf(&self) -> Option<&LeafDifference> {
        match self {
            Difference::Leaf(leaf) => Some(leaf),
            Difference::Nested(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&DiffNode> {
        match self {
            Difference::Nested(node) => Some(node),
            Difference::Leaf(_) => None,
        }
    }

    /// Number of leaf differences underneath
    pub fn leaf_count(&self) -> usize {
        match self {
            Difference::Leaf(_) => 1,
            Difference::Nested(node) => node.leaf_count(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Difference::Leaf(leaf) => serde_json::json!({
                "sourceValue": leaf.source_value,
                "targetValue": leaf.target_value,
            }),
            Difference::Nested(node) => node.to_json(),
        }
    }
}

/// Ordered key → difference mapping; a key is present only if something differs under it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffNode {
    entries: Vec<(String, Difference)>,
}

impl DiffNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, difference: Difference) {
        self.entries.push((key.into(), difference));
    }

    pub fn get(&self, key: &str) -> Option<&Difference> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, d)| d)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Difference)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.entries.iter().map(|(_, d)| d.leaf_count()).sum()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, d)| (k.clone(), d.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl Serialize for DiffNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, difference) in &self.entries {
            map.serialize_entry(key, difference)?;
        }
        map.end()
    }
}

/// Deep comparison with a fixed set of ignored keys
#[derive(Debug, Clone)]
pub struct StructuralDiffer {
    ignored_keys: HashSet<String>,
}

impl Default for StructuralDiffer {
    fn default() -> Self {
        Self::with_ignored_keys([MODIFIED_KEY])
    }
}

impl StructuralDiffer {
    /// Differ ignoring `modified`
    pub fn new() -> Self {
        Self::default()
    }

    /// Differ ignoring exactly `keys` (may be empty)
    pub fn with_ignored_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        StructuralDiffer {
            ignored_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_keys.contains(key)
    }

    /// `None` when the documents are structurally equivalent
    pub fn diff(&self, source: &Value, target: &Value) -> Option<Difference> {
        if source == target {
            return None;
        }
        match (source, target) {
            (Value::Object(s), Value::Object(t)) => {
                let node = self.diff_maps(s, t);
                (!node.is_empty()).then_some(Difference::Nested(node))
            }
            (Value::Array(s), Value::Array(t)) => self.diff_sequences(s, t),
            _ => Some(Difference::leaf(source.clone(), target.clone())),
        }
    }

    fn diff_maps(&self, source: &Map<String, Value>, target: &Map<String, Value>) -> DiffNode {
        let mut node = DiffNode::new();

        for (key, value) in source {
            if !self.is_ignored(key) && !target.contains_key(key) {
                node.insert(key.clone(), Difference::leaf(value.clone(), Value::Null));
            }
        }
        for (key, value) in target {
            if !self.is_ignored(key) && !source.contains_key(key) {
                node.insert(key.clone(), Difference::leaf(Value::Null, value.clone()));
            }
        }
        for (key, value) in source {
            if self.is_ignored(key) {
                continue;
            }
            if let Some(other) = target.get(key) {
                if let Some(difference) = self.diff(value, other) {
                    node.insert(key.clone(), difference);
                }
            }
        }
        node
    }

    fn diff_sequences(&self, source: &[Value], target: &[Value]) -> Option<Difference> {
        let whole = || {
            Some(Difference::leaf(
                Value::Array(source.to_vec()),
                Value::Array(target.to_vec()),
            ))
        };
        if source.len() != target.len() {
            return whole();
        }

        // A lone changed container keeps its nested difference; anything else
        // reports both sequences whole so no changed element is lost.
        let mut changed = source.iter().zip(target).filter_map(|(s, t)| self.diff(s, t));
        let first = changed.next()?;
        if changed.next().is_some() {
            return whole();
        }
        match first {
            Difference::Nested(node) => Some(Difference::Nested(node)),
            Difference::Leaf(_) => whole(),
        }
    }
}
