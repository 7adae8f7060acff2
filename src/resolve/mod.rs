//! Field Resolution
//!
//! Resolves every attribute of a record, following references into other
//! records of the same store. Attribute row queries for one record run as
//! spawned tasks; references held by one attribute resolve concurrently and
//! keep their row order. `resolve_record` returns only after every fetch it
//! transitively triggered has finished.
//!
//! Errors are contained at the smallest scope: a bad attribute becomes an
//! unresolved marker and is written to the exception log. Only a reference
//! cycle, the depth limit, or a missing top-level record fail the whole call.

pub mod strategy;
pub mod tracker;
pub mod value;

pub use strategy::{StrategyKind, StrategyTable, TypeStrategy};
pub use tracker::{ResolutionStats, ResolutionTracker, TaskGroup};
pub use value::{ResolvedRecord, ResolvedValue, UNRESOLVED_KEY};

use crate::error::ResolveError;
use crate::exceptions::ExceptionLog;
use crate::store::{AttributeDefinition, RowSource, StoreData, ValueRow};
use crate::types::RecordId;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default bound on reference nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Records in progress on one resolution branch, outermost first
#[derive(Debug, Clone, Default)]
struct Ancestry(Vec<RecordId>);

impl Ancestry {
    fn contains(&self, id: RecordId) -> bool {
        self.0.contains(&id)
    }

    fn depth(&self) -> usize {
        self.0.len()
    }

    fn child(&self, id: RecordId) -> Ancestry {
        let mut ids = self.0.clone();
        ids.push(id);
        Ancestry(ids)
    }
}

/// Recursive attribute resolver for one store
#[derive(Clone)]
pub struct FieldResolver {
    source: Arc<dyn RowSource>,
    store: Arc<StoreData>,
    strategies: Arc<StrategyTable>,
    exceptions: ExceptionLog,
    max_depth: usize,
}

impl std::fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldResolver")
            .field("source", &self.source.label())
            .field("strategies", &self.strategies.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl FieldResolver {
    /// Create a resolver over an already-loaded store
    pub fn new(source: Arc<dyn RowSource>, store: Arc<StoreData>, exceptions: ExceptionLog) -> Self {
        FieldResolver {
            source,
            store,
            strategies: Arc::new(StrategyTable::default()),
            exceptions,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyTable) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn store(&self) -> &StoreData {
        &self.store
    }

    pub fn exceptions(&self) -> &ExceptionLog {
        &self.exceptions
    }

    /// Resolve every attribute of `id`, recursively.
    ///
    /// Fatal errors (cycle, depth limit, unknown record) are written to the
    /// exception log before being returned.
    pub async fn resolve_record(&self, id: RecordId) -> Result<ResolvedRecord, ResolveError> {
        self.resolve_record_with_stats(id).await.0
    }

    /// `resolve_record`, also returning the work counters of the call
    #[instrument(skip(self), fields(store = %self.source.label()))]
    pub async fn resolve_record_with_stats(
        &self,
        id: RecordId,
    ) -> (Result<ResolvedRecord, ResolveError>, ResolutionStats) {
        let tracker = ResolutionTracker::new();
        let result = self
            .resolve_subtree(id, Ancestry::default(), tracker.clone())
            .await;
        let stats = tracker.stats();
        debug_assert_eq!(stats.outstanding, 0);

        match &result {
            Ok(record) => debug!(
                record_id = id,
                attributes = record.len(),
                fetches = stats.fetches,
                records = stats.records,
                "Resolved record"
            ),
            Err(err) => self.exceptions.record_error(err),
        }
        (result, stats)
    }

    fn resolve_subtree(
        &self,
        id: RecordId,
        ancestry: Ancestry,
        tracker: ResolutionTracker,
    ) -> BoxFuture<'static, Result<ResolvedRecord, ResolveError>> {
        let resolver = self.clone();
        async move {
            if ancestry.contains(id) {
                return Err(ResolveError::CyclicReference {
                    record_id: id,
                    chain: ancestry.0.clone(),
                });
            }
            if ancestry.depth() >= resolver.max_depth {
                return Err(ResolveError::DepthLimitExceeded {
                    record_id: id,
                    limit: resolver.max_depth,
                });
            }

            let _work = tracker.enter_record();
            let record = resolver
                .store
                .record(id)
                .ok_or(ResolveError::RecordNotFound(id))?;
            let definitions = resolver.store.attributes_for(record.attribute_set_id);

            let mut resolved = ResolvedRecord::new(id);
            if definitions.is_empty() {
                return Ok(resolved);
            }

            let ancestry = ancestry.child(id);
            let mut group = TaskGroup::new(tracker.clone());
            for (slot, definition) in definitions.iter().cloned().enumerate() {
                let resolver = resolver.clone();
                let ancestry = ancestry.clone();
                let tracker = tracker.clone();
                group.spawn(async move {
                    let value = resolver
                        .resolve_attribute(id, &definition, ancestry, tracker)
                        .await;
                    (slot, value)
                });
            }

            // Tasks finish in any order; slots restore ordinal order.
            let mut slots: Vec<Option<ResolvedValue>> = vec![None; definitions.len()];
            let mut fatal: Option<(usize, ResolveError)> = None;
            for joined in group.join().await {
                match joined {
                    Ok((slot, Ok(value))) => slots[slot] = Some(value),
                    Ok((slot, Err(err))) => {
                        if fatal.as_ref().map_or(true, |(first, _)| slot < *first) {
                            fatal = Some((slot, err));
                        }
                    }
                    Err(err) => resolver.exceptions.record_error(&err),
                }
            }
            if let Some((_, err)) = fatal {
                return Err(err);
            }

            for (definition, value) in definitions.iter().zip(slots) {
                let value = value.unwrap_or_else(|| ResolvedValue::unresolved("TaskFailed"));
                resolved.push(definition.attribute_name.clone(), value);
            }
            Ok(resolved)
        }
        .boxed()
    }

    /// Resolve one attribute. `Err` is reserved for errors fatal to the
    /// top-level record; everything else is contained in the value.
    async fn resolve_attribute(
        &self,
        record_id: RecordId,
        definition: &AttributeDefinition,
        ancestry: Ancestry,
        tracker: ResolutionTracker,
    ) -> Result<ResolvedValue, ResolveError> {
        let name = definition.attribute_name.as_str();
        let strategy = match self.strategies.lookup(&definition.type_tag) {
            Some(strategy) => strategy.configured(&definition.type_config),
            None => {
                return Ok(self.contain(ResolveError::UnknownAttributeType {
                    attribute: name.to_string(),
                    type_tag: definition.type_tag.clone(),
                }))
            }
        };

        let fetched = {
            let _fetch = tracker.enter_fetch();
            self.source.fetch_value_rows(record_id, name).await
        };
        let rows = match fetched {
            Ok(rows) => rows,
            Err(source) => {
                return Ok(self.contain(ResolveError::FetchFailure {
                    record_id,
                    attribute: name.to_string(),
                    source,
                }))
            }
        };
        debug!(
            record_id,
            attribute = name,
            strategy = %strategy.kind(),
            rows = rows.len(),
            "Resolving attribute"
        );

        match strategy {
            TypeStrategy::Direct => Ok(self
                .single_row(record_id, name, rows)
                .map(|row| ResolvedValue::Value(row.value))
                .unwrap_or(ResolvedValue::Absent)),
            TypeStrategy::OrderedAttachment { caption } => Ok(attachments(rows, &caption)),
            TypeStrategy::ModuleReference => Ok(self.modules(record_id, name, &rows)),
            TypeStrategy::SingleReference => {
                if rows.is_empty() {
                    return Ok(ResolvedValue::Absent);
                }
                let single = rows.len() == 1;
                let references = rows
                    .iter()
                    .map(|row| reference_id(record_id, name, &row.value))
                    .collect();
                let mut values = self
                    .follow(record_id, name, references, ancestry, tracker)
                    .await?;
                if single {
                    Ok(values.pop().unwrap_or(ResolvedValue::Absent))
                } else {
                    Ok(ResolvedValue::Sequence(values))
                }
            }
            TypeStrategy::CollectionReference => {
                let references = rows
                    .iter()
                    .map(|row| reference_id(record_id, name, &row.value))
                    .collect();
                let values = self
                    .follow(record_id, name, references, ancestry, tracker)
                    .await?;
                Ok(ResolvedValue::Sequence(values))
            }
            TypeStrategy::DelimitedListReference { delimiter } => {
                let row = match self.single_row(record_id, name, rows) {
                    Some(row) => row,
                    None => return Ok(ResolvedValue::Absent),
                };
                let references = split_references(&row.value, delimiter)
                    .into_iter()
                    .map(|parsed| {
                        parsed.map_err(|value| ResolveError::InvalidReference {
                            record_id,
                            attribute: name.to_string(),
                            value,
                        })
                    })
                    .collect();
                let values = self
                    .follow(record_id, name, references, ancestry, tracker)
                    .await?;
                Ok(ResolvedValue::Sequence(values))
            }
        }
    }

    /// Resolve referenced records concurrently, keeping reference order
    async fn follow(
        &self,
        record_id: RecordId,
        name: &str,
        references: Vec<Result<RecordId, ResolveError>>,
        ancestry: Ancestry,
        tracker: ResolutionTracker,
    ) -> Result<Vec<ResolvedValue>, ResolveError> {
        let pending = references.into_iter().map(|reference| {
            let ancestry = ancestry.clone();
            let tracker = tracker.clone();
            async move {
                let referenced = match reference {
                    Ok(id) => id,
                    Err(err) => return Ok(self.contain(err)),
                };
                match self.resolve_subtree(referenced, ancestry, tracker).await {
                    Ok(record) => Ok(ResolvedValue::Record(record)),
                    Err(ResolveError::RecordNotFound(missing)) if missing == referenced => {
                        Ok(self.contain(ResolveError::DanglingReference {
                            record_id,
                            attribute: name.to_string(),
                            referenced,
                        }))
                    }
                    Err(err) => Err(err),
                }
            }
        });

        // Every branch finishes before the first fatal error is surfaced.
        join_all(pending).await.into_iter().collect()
    }

    fn modules(&self, record_id: RecordId, name: &str, rows: &[ValueRow]) -> ResolvedValue {
        let items = rows
            .iter()
            .map(|row| match parse_reference(&row.value) {
                None => self.contain(ResolveError::InvalidReference {
                    record_id,
                    attribute: name.to_string(),
                    value: row.value.to_string(),
                }),
                Some(module_id) => match self.store.module(module_id) {
                    Some(module) => ResolvedValue::Value(module.to_json()),
                    None => self.contain(ResolveError::MissingModule {
                        record_id,
                        attribute: name.to_string(),
                        module_id,
                    }),
                },
            })
            .collect();
        ResolvedValue::Sequence(items)
    }

    /// The only row of a single-valued attribute. More than one row is
    /// logged and treated as no row.
    fn single_row(&self, record_id: RecordId, name: &str, rows: Vec<ValueRow>) -> Option<ValueRow> {
        match rows.len() {
            0 => None,
            1 => rows.into_iter().next(),
            count => {
                self.exceptions.record_error(&ResolveError::MultipleValueRows {
                    record_id,
                    attribute: name.to_string(),
                    count,
                });
                None
            }
        }
    }

    fn contain(&self, err: ResolveError) -> ResolvedValue {
        self.exceptions.record_error(&err);
        ResolvedValue::unresolved(err.kind())
    }
}

/// Rows sorted by sort key (rows without one last), timestamps dropped
fn attachments(mut rows: Vec<ValueRow>, caption: &str) -> ResolvedValue {
    rows.sort_by_key(|row| row.sort.unwrap_or(i64::MAX));
    let items = rows
        .into_iter()
        .map(|row| {
            let caption = row.extra.get(caption).cloned().unwrap_or(Value::Null);
            ResolvedValue::Value(json!({ "value": row.value, "caption": caption }))
        })
        .collect();
    ResolvedValue::Sequence(items)
}

/// Integer id from a numeric or numeric-string value
fn parse_reference(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reference_id(record_id: RecordId, name: &str, value: &Value) -> Result<RecordId, ResolveError> {
    parse_reference(value).ok_or_else(|| ResolveError::InvalidReference {
        record_id,
        attribute: name.to_string(),
        value: value.to_string(),
    })
}

/// Split a delimiter-joined id list. Empty segments are skipped; segments
/// that are not integers come back as `Err(segment)`.
fn split_references(value: &Value, delimiter: char) -> Vec<Result<RecordId, String>> {
    match value {
        Value::Null => Vec::new(),
        Value::String(list) => list
            .split(delimiter)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.parse().map_err(|_| segment.to_string()))
            .collect(),
        other => vec![parse_reference(other).ok_or_else(|| other.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AttributeDefinition, ModuleDefinition, Record, Snapshot, SnapshotSource};
    use std::time::Duration;

    async fn resolver_for(source: SnapshotSource) -> (FieldResolver, Arc<SnapshotSource>, ExceptionLog) {
        let source = Arc::new(source);
        let store = Arc::new(StoreData::load(source.as_ref()).await.unwrap());
        let exceptions = ExceptionLog::in_memory();
        let rows: Arc<dyn RowSource> = source.clone();
        (FieldResolver::new(rows, store, exceptions.clone()), source, exceptions)
    }

    fn page(id: RecordId, parent: Option<RecordId>, name: &str, set: i64) -> Record {
        Record::new(id, parent, name).with_attribute_set(set)
    }

    #[tokio::test]
    async fn test_zero_attributes_is_empty_and_idle() {
        let snapshot = Snapshot::new().record(page(1, None, "/", 99));
        let (resolver, source, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let (result, stats) = resolver.resolve_record_with_stats(1).await;
        let record = result.unwrap();
        assert!(record.is_empty());
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.fetches, 0);
        assert_eq!(source.fetch_count(), 0);
        assert!(exceptions.events().is_empty());
    }

    #[tokio::test]
    async fn test_direct_values() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "title", "FieldtypePageTitle", 0))
            .attribute(AttributeDefinition::new(1, 2, "summary", "FieldtypeTextarea", 1))
            .attribute(AttributeDefinition::new(1, 3, "count", "FieldtypeInteger", 2))
            .rows(1, "title", vec![ValueRow::new("Home")])
            .rows(1, "count", vec![ValueRow::new(3), ValueRow::new(4)]);
        let (resolver, _, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(record.get("title"), Some(&ResolvedValue::Value(json!("Home"))));
        assert_eq!(record.get("summary"), Some(&ResolvedValue::Absent));
        assert_eq!(record.get("count"), Some(&ResolvedValue::Absent));
        assert_eq!(record.names(), vec!["title", "summary", "count"]);
        assert_eq!(exceptions.count("MultipleValueRows"), 1);
        assert_eq!(exceptions.error_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_does_not_block_siblings() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "grid", "FieldtypeMatrix", 0))
            .attribute(AttributeDefinition::new(1, 2, "title", "FieldtypeText", 1))
            .rows(1, "title", vec![ValueRow::new("Home")]);
        let (resolver, source, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.get("grid"),
            Some(&ResolvedValue::unresolved("UnknownAttributeType"))
        );
        assert_eq!(record.get("title"), Some(&ResolvedValue::Value(json!("Home"))));
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(exceptions.count("UnknownAttributeType"), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "title", "FieldtypeText", 0))
            .attribute(AttributeDefinition::new(1, 2, "body", "FieldtypeTextarea", 1))
            .rows(1, "title", vec![ValueRow::new("Home")])
            .rows(1, "body", vec![ValueRow::new("<p>hi</p>")]);
        let source = SnapshotSource::new("s", snapshot).with_failure(1, "body");
        let (resolver, _, exceptions) = resolver_for(source).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(record.get("title"), Some(&ResolvedValue::Value(json!("Home"))));
        assert_eq!(record.get("body"), Some(&ResolvedValue::unresolved("FetchFailure")));

        let events = exceptions.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("record 1"));
        assert!(events[0].message.contains("body"));
    }

    #[tokio::test]
    async fn test_attachments_sorted_without_timestamps() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "images", "FieldtypeImage", 0))
            .attribute(AttributeDefinition::new(1, 2, "notes", "FieldtypePadNotes", 1))
            .rows(
                1,
                "images",
                vec![
                    ValueRow::new("b.jpg")
                        .with_sort(2)
                        .with_column("description", "Second")
                        .with_column("modified", "2016-01-02 10:00:00"),
                    ValueRow::new("a.jpg")
                        .with_sort(1)
                        .with_column("description", "First")
                        .with_column("created", "2016-01-01 10:00:00"),
                    ValueRow::new("c.jpg"),
                ],
            )
            .rows(1, "notes", vec![ValueRow::new("n1").with_column("notes", "remember")]);
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.get("images").unwrap().to_json(),
            json!([
                {"value": "a.jpg", "caption": "First"},
                {"value": "b.jpg", "caption": "Second"},
                {"value": "c.jpg", "caption": null}
            ])
        );
        assert_eq!(
            record.get("notes").unwrap().to_json(),
            json!([{"value": "n1", "caption": "remember"}])
        );
    }

    #[tokio::test]
    async fn test_module_references() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "inputfield", "FieldtypeModule", 0))
            .rows(1, "inputfield", vec![ValueRow::new(7), ValueRow::new("8")])
            .module(ModuleDefinition {
                id: 7,
                class: "InputfieldCKEditor".to_string(),
                flags: 1,
                data: json!({"toolbar": "Bold"}),
            });
        let (resolver, _, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.get("inputfield").unwrap().to_json(),
            json!([
                {"class": "InputfieldCKEditor", "flags": 1, "data": {"toolbar": "Bold"}},
                {"$unresolved": "MissingModule"}
            ])
        );
        assert_eq!(exceptions.count("MissingModule"), 1);
    }

    fn reference_store(type_tag: &str, rows: Vec<ValueRow>) -> Snapshot {
        Snapshot::new()
            .record(page(1, None, "/", 1))
            .record(page(11, Some(1), "x", 2))
            .record(page(12, Some(1), "y", 2))
            .attribute(AttributeDefinition::new(1, 1, "refs", type_tag, 0))
            .attribute(AttributeDefinition::new(2, 2, "title", "FieldtypeText", 0))
            .rows(1, "refs", rows)
            .rows(11, "title", vec![ValueRow::new("X")])
            .rows(12, "title", vec![ValueRow::new("Y")])
    }

    #[tokio::test]
    async fn test_single_reference() {
        let snapshot = reference_store("FieldtypePage", vec![ValueRow::new(12)]);
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        let referenced = record.get("refs").and_then(|v| v.as_record()).unwrap();
        assert_eq!(referenced.record_id(), 12);
        assert_eq!(record.to_json(), json!({"refs": {"title": "Y"}}));
    }

    #[tokio::test]
    async fn test_collection_keeps_row_order() {
        let snapshot = reference_store(
            "FieldtypePageTable",
            vec![ValueRow::new(12), ValueRow::new(11)],
        );
        let source = SnapshotSource::new("s", snapshot).with_latency(Duration::from_millis(2));
        let (resolver, _, _) = resolver_for(source).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.to_json(),
            json!({"refs": [{"title": "Y"}, {"title": "X"}]})
        );
    }

    #[tokio::test]
    async fn test_delimited_list() {
        let snapshot = reference_store("FieldtypeRepeater", vec![ValueRow::new("11, 12,,abc")]);
        let (resolver, _, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.to_json(),
            json!({"refs": [
                {"title": "X"},
                {"title": "Y"},
                {"$unresolved": "InvalidReference"}
            ]})
        );
        assert_eq!(exceptions.count("InvalidReference"), 1);

        let empty = reference_store("FieldtypeRepeater", vec![ValueRow::new("")]);
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", empty)).await;
        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(record.get("refs"), Some(&ResolvedValue::Sequence(vec![])));
    }

    #[tokio::test]
    async fn test_dangling_reference_is_contained() {
        let snapshot = reference_store(
            "FieldtypePageTable",
            vec![ValueRow::new(11), ValueRow::new(404)],
        );
        let (resolver, _, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.to_json(),
            json!({"refs": [{"title": "X"}, {"$unresolved": "DanglingReference"}]})
        );
        assert_eq!(exceptions.count("DanglingReference"), 1);
    }

    #[tokio::test]
    async fn test_collection_cycle_fails_without_hanging() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .record(page(2, Some(1), "a", 1))
            .attribute(AttributeDefinition::new(1, 1, "related", "FieldtypePageTable", 0))
            .rows(1, "related", vec![ValueRow::new(2)])
            .rows(2, "related", vec![ValueRow::new(1)]);
        let (resolver, _, exceptions) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let (result, stats) = tokio::time::timeout(
            Duration::from_secs(5),
            resolver.resolve_record_with_stats(1),
        )
        .await
        .expect("cycle must not hang");

        assert_eq!(
            result.unwrap_err(),
            ResolveError::CyclicReference {
                record_id: 1,
                chain: vec![1, 2]
            }
        );
        assert_eq!(stats.outstanding, 0);
        assert_eq!(exceptions.count("CyclicReference"), 1);
    }

    #[tokio::test]
    async fn test_self_reference_is_a_cycle() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "parent_page", "FieldtypePage", 0))
            .rows(1, "parent_page", vec![ValueRow::new(1)]);
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let err = resolver.resolve_record(1).await.unwrap_err();
        assert_eq!(err.kind(), "CyclicReference");
    }

    #[tokio::test]
    async fn test_diamond_is_not_a_cycle() {
        let snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .record(page(2, Some(1), "b", 1))
            .record(page(3, Some(1), "c", 1))
            .record(page(4, Some(1), "d", 2))
            .attribute(AttributeDefinition::new(1, 1, "related", "FieldtypePageTable", 0))
            .attribute(AttributeDefinition::new(2, 2, "title", "FieldtypeText", 0))
            .rows(1, "related", vec![ValueRow::new(2), ValueRow::new(3)])
            .rows(2, "related", vec![ValueRow::new(4)])
            .rows(3, "related", vec![ValueRow::new(4)])
            .rows(4, "title", vec![ValueRow::new("D")]);
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot)).await;

        let (result, stats) = resolver.resolve_record_with_stats(1).await;
        assert_eq!(
            result.unwrap().to_json(),
            json!({"related": [
                {"related": [{"title": "D"}]},
                {"related": [{"title": "D"}]}
            ]})
        );
        assert_eq!(stats.records, 5);
        assert_eq!(stats.outstanding, 0);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut snapshot = Snapshot::new()
            .record(page(1, None, "/", 1))
            .attribute(AttributeDefinition::new(1, 1, "next", "FieldtypePage", 0));
        for id in 2..=4 {
            snapshot = snapshot.record(page(id, Some(1), &format!("p{}", id), 1));
        }
        for id in 1..4 {
            snapshot = snapshot.rows(id, "next", vec![ValueRow::new(id + 1)]);
        }
        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot.clone())).await;
        let err = resolver.with_max_depth(2).resolve_record(1).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::DepthLimitExceeded {
                record_id: 3,
                limit: 2
            }
        );

        let (resolver, _, _) = resolver_for(SnapshotSource::new("s", snapshot)).await;
        let record = resolver.resolve_record(1).await.unwrap();
        assert_eq!(
            record.to_json(),
            json!({"next": {"next": {"next": {"next": null}}}})
        );
    }

    #[tokio::test]
    async fn test_missing_top_level_record() {
        let (resolver, _, exceptions) =
            resolver_for(SnapshotSource::new("s", Snapshot::new())).await;
        assert_eq!(
            resolver.resolve_record(9).await.unwrap_err(),
            ResolveError::RecordNotFound(9)
        );
        assert_eq!(exceptions.count("RecordNotFound"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_attributes_fan_out_and_keep_ordinal_order() {
        let mut snapshot = Snapshot::new().record(page(1, None, "/", 1));
        for i in 0..12 {
            let name = format!("field{:02}", i);
            snapshot = snapshot
                .attribute(AttributeDefinition::new(1, i, &name, "FieldtypeText", 12 - i))
                .rows(1, &name, vec![ValueRow::new(i)]);
        }
        let source = SnapshotSource::new("s", snapshot).with_latency(Duration::from_millis(5));
        let (resolver, _, _) = resolver_for(source).await;

        let (result, stats) = resolver.resolve_record_with_stats(1).await;
        let record = result.unwrap();
        assert_eq!(record.names().first(), Some(&"field11"));
        assert_eq!(record.names().last(), Some(&"field00"));
        assert_eq!(stats.fetches, 12);
        assert!(stats.peak_outstanding > 2);
        assert_eq!(stats.outstanding, 0);

        let again = resolver.resolve_record(1).await.unwrap();
        assert_eq!(again, record);
    }

    #[test]
    fn test_split_references() {
        assert_eq!(
            split_references(&json!("1,2, 3"), ','),
            vec![Ok(1), Ok(2), Ok(3)]
        );
        assert_eq!(split_references(&json!(""), ','), vec![]);
        assert_eq!(split_references(&json!(5), ','), vec![Ok(5)]);
        assert_eq!(
            split_references(&json!("4|x"), '|'),
            vec![Ok(4), Err("x".to_string())]
        );
        assert!(split_references(&Value::Null, ',').is_empty());
    }
}
