//! Keyed Index
//!
//! Multi-level grouping of records by an ordered tuple of key fields. Every
//! level remembers first-insertion order so enumeration is deterministic; the
//! last level holds the records sharing a full key tuple, in insertion order.
//!
//! Built once and then shared read-only; there is no removal.

use crate::error::IndexError;
use std::collections::HashMap;

/// Key segment used when a record has no value for a key field
pub const MISSING_KEY: &str = "null";

/// Extracts key-field values from a record
pub trait KeyFields {
    /// Value of `field` rendered as a key segment, or `None` when absent
    fn key_value(&self, field: &str) -> Option<String>;
}

impl KeyFields for serde_json::Value {
    fn key_value(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// One level of the index: either branches (more key fields follow) or leaves.
#[derive(Debug, Clone)]
pub struct Level<R> {
    order: Vec<String>,
    branches: HashMap<String, Level<R>>,
    leaves: HashMap<String, Vec<R>>,
}

impl<R> Level<R> {
    fn new() -> Self {
        Level {
            order: Vec::new(),
            branches: HashMap::new(),
            leaves: HashMap::new(),
        }
    }

    fn branch_mut(&mut self, key: &str) -> &mut Level<R> {
        let order = &mut self.order;
        self.branches.entry(key.to_string()).or_insert_with(|| {
            order.push(key.to_string());
            Level::new()
        })
    }

    fn leaf_mut(&mut self, key: &str) -> &mut Vec<R> {
        let order = &mut self.order;
        self.leaves.entry(key.to_string()).or_insert_with(|| {
            order.push(key.to_string());
            Vec::new()
        })
    }

    /// Key segments at this level in first-insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Child bucket for one key segment
    pub fn get(&self, key: &str) -> Option<Lookup<'_, R>> {
        if let Some(level) = self.branches.get(key) {
            return Some(Lookup::Branch(level));
        }
        self.leaves
            .get(key)
            .map(|records| Lookup::Records(records.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Result of a partial or full key lookup
#[derive(Debug)]
pub enum Lookup<'a, R> {
    /// Partial key: the nested level below the given prefix
    Branch(&'a Level<R>),
    /// Full key: the records sharing the whole key tuple
    Records(&'a [R]),
}

impl<'a, R> Lookup<'a, R> {
    pub fn records(&self) -> Option<&'a [R]> {
        match self {
            Lookup::Records(records) => Some(records),
            Lookup::Branch(_) => None,
        }
    }
}

/// Leaf produced by `KeyedIndex::entries`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry<'a, R> {
    pub key: Vec<&'a str>,
    pub records: &'a [R],
}

/// Records indexed by an ordered tuple of key fields
#[derive(Debug, Clone)]
pub struct KeyedIndex<R> {
    keys: Vec<String>,
    root: Level<R>,
    count: usize,
}

impl<R: KeyFields> KeyedIndex<R> {
    /// Create an empty index over the given key tuple
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Result<Self, IndexError> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(IndexError::InvalidKey("empty key tuple".to_string()));
        }
        Ok(KeyedIndex {
            keys,
            root: Level::new(),
            count: 0,
        })
    }

    /// Create an index and insert `records` in order
    pub fn with_records<K: Into<String>>(
        keys: impl IntoIterator<Item = K>,
        records: impl IntoIterator<Item = R>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(keys)?;
        index.extend(records);
        Ok(index)
    }

    /// Insert a record under its key tuple, appending to the leaf sequence
    pub fn insert(&mut self, record: R) {
        let values: Vec<String> = self
            .keys
            .iter()
            .map(|field| {
                record
                    .key_value(field)
                    .unwrap_or_else(|| MISSING_KEY.to_string())
            })
            .collect();

        let Some((last, prefix)) = values.split_last() else {
            return;
        };
        let mut level = &mut self.root;
        for segment in prefix {
            level = level.branch_mut(segment);
        }
        level.leaf_mut(last).push(record);
        self.count += 1;
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = R>) {
        for record in records {
            self.insert(record);
        }
    }
}

impl<R> KeyedIndex<R> {
    /// The key tuple this index was built with
    pub fn key_fields(&self) -> &[String] {
        &self.keys
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Look up a partial or full key tuple.
    ///
    /// Returns `Ok(None)` when any segment is absent. An empty key returns the root level.
    pub fn lookup<K: AsRef<str>>(&self, key: &[K]) -> Result<Option<Lookup<'_, R>>, IndexError> {
        if key.len() > self.keys.len() {
            return Err(IndexError::KeyTooLong {
                given: key.len(),
                defined: self.keys.len(),
            });
        }
        let mut current = Lookup::Branch(&self.root);
        for segment in key {
            current = match current {
                Lookup::Branch(level) => match level.get(segment.as_ref()) {
                    Some(next) => next,
                    None => return Ok(None),
                },
                Lookup::Records(_) => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    /// Records for a full key tuple; empty when the tuple is absent or partial
    pub fn records<K: AsRef<str>>(&self, key: &[K]) -> &[R] {
        match self.lookup(key) {
            Ok(Some(Lookup::Records(records))) => records,
            _ => &[],
        }
    }

    /// Lazily enumerate every leaf in first-insertion order at each level.
    ///
    /// Each call starts a fresh traversal.
    pub fn entries(&self) -> Entries<'_, R> {
        Entries {
            stack: vec![(&self.root, 0)],
            key: Vec::new(),
        }
    }

    /// Key tuples of every leaf
    pub fn key_tuples(&self) -> Vec<Vec<&str>> {
        self.entries().map(|entry| entry.key).collect()
    }

    /// Group records by one key field, concatenating the leaves that share its value.
    ///
    /// Groups are ordered by first appearance during enumeration.
    pub fn group_by(&self, field: &str) -> Result<Vec<(&str, Vec<&R>)>, IndexError> {
        let position = self
            .keys
            .iter()
            .position(|k| k == field)
            .ok_or_else(|| IndexError::InvalidKey(field.to_string()))?;

        let mut groups: Vec<(&str, Vec<&R>)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for entry in self.entries() {
            let value = entry.key[position];
            let slot = *slots.entry(value).or_insert_with(|| {
                groups.push((value, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.extend(entry.records.iter());
        }
        Ok(groups)
    }
}

/// Depth-first iterator over the leaves of a `KeyedIndex`
pub struct Entries<'a, R> {
    stack: Vec<(&'a Level<R>, usize)>,
    key: Vec<&'a str>,
}

impl<'a, R> Iterator for Entries<'a, R> {
    type Item = IndexEntry<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (level, position) = {
                let top = self.stack.last_mut()?;
                let current = (top.0, top.1);
                top.1 += 1;
                current
            };

            let Some(segment) = level.order.get(position) else {
                self.stack.pop();
                self.key.pop();
                continue;
            };

            if let Some(branch) = level.branches.get(segment) {
                self.key.push(segment.as_str());
                self.stack.push((branch, 0));
                continue;
            }
            if let Some(records) = level.leaves.get(segment) {
                let mut key = self.key.clone();
                key.push(segment.as_str());
                return Some(IndexEntry {
                    key,
                    records: records.as_slice(),
                });
            }
        }
    }
}
