//! Store builders shared by the integration tests

use pagediff::config::ReconcileConfig;
use pagediff::exceptions::ExceptionLog;
use pagediff::reconcile::Reconciler;
use pagediff::store::{AttributeDefinition, Record, RowSource, Snapshot, SnapshotSource};
use pagediff::types::RecordId;
use std::sync::Arc;

pub const PAGE_SET: i64 = 1;

pub fn page(id: RecordId, parent: Option<RecordId>, name: &str) -> Record {
    Record::new(id, parent, name).with_attribute_set(PAGE_SET)
}

/// Attribute set with a title and an ordered collection of related pages
pub fn page_attributes(snapshot: Snapshot) -> Snapshot {
    snapshot
        .attribute(AttributeDefinition::new(PAGE_SET, 1, "title", "FieldtypePageTitle", 0))
        .attribute(AttributeDefinition::new(PAGE_SET, 2, "related", "FieldtypePageTable", 1))
}

pub fn source(label: &str, snapshot: Snapshot) -> Arc<dyn RowSource> {
    Arc::new(SnapshotSource::new(label, snapshot))
}

pub fn reconciler() -> (Reconciler, ExceptionLog) {
    let exceptions = ExceptionLog::in_memory();
    (
        Reconciler::new(ReconcileConfig::default(), exceptions.clone()).unwrap(),
        exceptions,
    )
}
