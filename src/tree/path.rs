//! Path construction
//!
//! A record's path is the names of its ancestors, root to leaf, joined with
//! `/`. The root itself is `/` and its own name never appears. Sibling order
//! follows input order.

use super::children::ChildrenIndex;
use crate::error::TreeError;
use crate::store::Record;
use crate::types::{RecordId, PATH_SEPARATOR};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Append one name segment to a parent path
pub fn join_path(parent: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent);
    if !parent.ends_with(PATH_SEPARATOR) {
        path.push(PATH_SEPARATOR);
    }
    path.push_str(name);
    path
}

/// Paths for every record of one store
#[derive(Debug, Clone)]
pub struct PathIndex {
    root: RecordId,
    order: Vec<(String, RecordId)>,
    by_path: HashMap<String, RecordId>,
    by_record: HashMap<RecordId, usize>,
    children: ChildrenIndex,
}

impl PathIndex {
    pub fn root(&self) -> RecordId {
        self.root
    }

    pub fn path_of(&self, id: RecordId) -> Option<&str> {
        self.by_record
            .get(&id)
            .map(|&i| self.order[i].0.as_str())
    }

    pub fn record_at(&self, path: &str) -> Option<RecordId> {
        self.by_path.get(path).copied()
    }

    /// (path, record) pairs in pre-order traversal order
    pub fn iter(&self) -> impl Iterator<Item = (&str, RecordId)> {
        self.order.iter().map(|(p, id)| (p.as_str(), *id))
    }

    pub fn paths(&self) -> Vec<&str> {
        self.order.iter().map(|(p, _)| p.as_str()).collect()
    }

    pub fn children(&self) -> &ChildrenIndex {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Builds a `PathIndex` from a set of records forming one tree
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    root: Option<RecordId>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require that the parentless record is `root`
    pub fn with_root(mut self, root: RecordId) -> Self {
        self.root = Some(root);
        self
    }

    /// Validate the tree shape and assign paths.
    ///
    /// Fails when there is not exactly one root, when a parent reference
    /// points outside the set, when a non-root name is empty or contains
    /// `/`, when two records end up on the same path, or when some records
    /// cannot be reached from the root.
    pub fn build(&self, records: &[Record]) -> Result<PathIndex, TreeError> {
        let mut ids: HashMap<RecordId, &Record> = HashMap::with_capacity(records.len());
        for record in records {
            if ids.insert(record.id, record).is_some() {
                return Err(TreeError::DuplicateRecord(record.id));
            }
        }

        let roots: Vec<RecordId> = records
            .iter()
            .filter(|r| r.parent().is_none())
            .map(|r| r.id)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(TreeError::MissingRoot),
            [only] => *only,
            _ => return Err(TreeError::MultipleRoots(roots)),
        };
        if let Some(designated) = self.root {
            if designated != root {
                return Err(TreeError::RootMismatch {
                    designated,
                    actual: root,
                });
            }
        }

        for record in records {
            if let Some(parent_id) = record.parent() {
                if !ids.contains_key(&parent_id) {
                    return Err(TreeError::OrphanedParent {
                        record_id: record.id,
                        parent_id,
                    });
                }
                if record.name.is_empty() || record.name.contains(PATH_SEPARATOR) {
                    return Err(TreeError::InvalidName {
                        record_id: record.id,
                        name: record.name.clone(),
                    });
                }
            }
        }

        let children = ChildrenIndex::from_records(records);

        let mut order: Vec<(String, RecordId)> = Vec::with_capacity(records.len());
        let mut by_path: HashMap<String, RecordId> = HashMap::with_capacity(records.len());
        let mut by_record: HashMap<RecordId, usize> = HashMap::with_capacity(records.len());

        // Pre-order walk; children are pushed in reverse so the first child pops first.
        let mut stack: Vec<(RecordId, String)> = vec![(root, PATH_SEPARATOR.to_string())];
        while let Some((id, path)) = stack.pop() {
            if let Some(&first) = by_path.get(&path) {
                return Err(TreeError::DuplicatePath {
                    path,
                    first,
                    second: id,
                });
            }

            for &child in children.children_of(id).iter().rev() {
                if by_record.contains_key(&child) {
                    continue;
                }
                if let Some(record) = ids.get(&child) {
                    stack.push((child, join_path(&path, &record.name)));
                }
            }

            by_path.insert(path.clone(), id);
            by_record.insert(id, order.len());
            order.push((path, id));
        }

        if order.len() < records.len() {
            let visited: HashSet<RecordId> = by_record.keys().copied().collect();
            let ids = records
                .iter()
                .map(|r| r.id)
                .filter(|id| !visited.contains(id))
                .collect();
            return Err(TreeError::Unreachable { ids });
        }

        debug!(root, paths = order.len(), "Built path index");

        Ok(PathIndex {
            root,
            order,
            by_path,
            by_record,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(ids: [RecordId; 4]) -> Vec<Record> {
        let [root, a, b, c] = ids;
        vec![
            Record::new(root, None, "home"),
            Record::new(a, Some(root), "a"),
            Record::new(b, Some(a), "b"),
            Record::new(c, Some(root), "c"),
        ]
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
    }

    #[test]
    fn test_paths_follow_name_chain() {
        let index = PathBuilder::new().build(&tree([1, 2, 3, 4])).unwrap();
        assert_eq!(index.root(), 1);
        assert_eq!(index.path_of(1), Some("/"));
        assert_eq!(index.path_of(2), Some("/a"));
        assert_eq!(index.path_of(3), Some("/a/b"));
        assert_eq!(index.path_of(4), Some("/c"));
        assert_eq!(index.record_at("/a/b"), Some(3));
        assert_eq!(index.paths(), vec!["/", "/a", "/a/b", "/c"]);
    }

    #[test]
    fn test_disjoint_ids_give_identical_paths() {
        let source = PathBuilder::new().build(&tree([1, 2, 3, 4])).unwrap();
        let target = PathBuilder::new().build(&tree([10, 77, 12, 5])).unwrap();
        assert_eq!(source.paths(), target.paths());
    }

    #[test]
    fn test_zero_parent_is_root() {
        let records = vec![Record::new(1, Some(0), "/"), Record::new(2, Some(1), "x")];
        let index = PathBuilder::new().with_root(1).build(&records).unwrap();
        assert_eq!(index.path_of(2), Some("/x"));
    }

    #[test]
    fn test_missing_and_multiple_roots() {
        let looped = vec![Record::new(1, Some(2), "a"), Record::new(2, Some(1), "b")];
        assert_eq!(PathBuilder::new().build(&looped).unwrap_err(), TreeError::MissingRoot);
        assert_eq!(PathBuilder::new().build(&[]).unwrap_err(), TreeError::MissingRoot);

        let two = vec![Record::new(1, None, "/"), Record::new(2, None, "/")];
        assert_eq!(
            PathBuilder::new().build(&two).unwrap_err(),
            TreeError::MultipleRoots(vec![1, 2])
        );
    }

    #[test]
    fn test_designated_root_must_match() {
        let err = PathBuilder::new()
            .with_root(9)
            .build(&tree([1, 2, 3, 4]))
            .unwrap_err();
        assert_eq!(err, TreeError::RootMismatch { designated: 9, actual: 1 });
    }

    #[test]
    fn test_orphaned_parent() {
        let records = vec![Record::new(1, None, "/"), Record::new(2, Some(99), "lost")];
        assert_eq!(
            PathBuilder::new().build(&records).unwrap_err(),
            TreeError::OrphanedParent { record_id: 2, parent_id: 99 }
        );
    }

    #[test]
    fn test_cycle_detached_from_root_is_unreachable() {
        let records = vec![
            Record::new(1, None, "/"),
            Record::new(2, Some(1), "a"),
            Record::new(3, Some(4), "x"),
            Record::new(4, Some(3), "y"),
        ];
        let err = PathBuilder::new().build(&records).unwrap_err();
        assert_eq!(err, TreeError::Unreachable { ids: vec![3, 4] });
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_duplicate_sibling_names() {
        let records = vec![
            Record::new(1, None, "/"),
            Record::new(2, Some(1), "a"),
            Record::new(3, Some(1), "a"),
        ];
        let err = PathBuilder::new().build(&records).unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicatePath { path: "/a".to_string(), first: 2, second: 3 }
        );
    }

    #[test]
    fn test_names_must_be_single_segments() {
        // "a/b" would otherwise land on the same path as b under a.
        let slashed = vec![
            Record::new(1, None, "/"),
            Record::new(2, Some(1), "a"),
            Record::new(3, Some(2), "b"),
            Record::new(4, Some(1), "a/b"),
        ];
        let err = PathBuilder::new().build(&slashed).unwrap_err();
        assert_eq!(err, TreeError::InvalidName { record_id: 4, name: "a/b".to_string() });
        assert!(err.is_malformed());
        assert!(err.to_string().starts_with("malformed tree: record 4 has invalid name"));

        let empty = vec![Record::new(1, None, "/"), Record::new(2, Some(1), "")];
        assert_eq!(
            PathBuilder::new().build(&empty).unwrap_err(),
            TreeError::InvalidName { record_id: 2, name: String::new() }
        );

        // The root's own name never appears in a path.
        assert!(PathBuilder::new().build(&[Record::new(1, None, "")]).is_ok());
    }

    #[test]
    fn test_duplicate_record_id() {
        let records = vec![Record::new(1, None, "/"), Record::new(1, Some(1), "a")];
        assert_eq!(
            PathBuilder::new().build(&records).unwrap_err(),
            TreeError::DuplicateRecord(1)
        );
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut records = vec![Record::new(1, None, "/")];
        for id in 2..2_000 {
            records.push(Record::new(id, Some(id - 1), "n"));
        }
        let index = PathBuilder::new().build(&records).unwrap();
        assert_eq!(index.len(), 1_999);
        assert!(index.path_of(1_999).unwrap().starts_with("/n/n/"));
    }
}
