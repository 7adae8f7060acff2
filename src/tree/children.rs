//! Parent → children index

use crate::store::Record;
use crate::types::RecordId;
use std::collections::HashMap;

/// Children of each record, in input order (never re-sorted)
#[derive(Debug, Clone, Default)]
pub struct ChildrenIndex {
    children: HashMap<RecordId, Vec<RecordId>>,
}

impl ChildrenIndex {
    /// Index every record that has a parent under that parent
    pub fn from_records(records: &[Record]) -> Self {
        let mut children: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
        for record in records {
            if let Some(parent) = record.parent() {
                children.entry(parent).or_default().push(record.id);
            }
        }
        ChildrenIndex { children }
    }

    pub fn children_of(&self, id: RecordId) -> &[RecordId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of parents with at least one child
    pub fn parent_count(&self) -> usize {
        self.children.len()
    }
}
