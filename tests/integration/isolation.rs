use crate::support::{page, page_attributes, reconciler, source};
use pagediff::config::ReconcileConfig;
use pagediff::exceptions::ExceptionLog;
use pagediff::reconcile::Reconciler;
use pagediff::store::{AttributeDefinition, Snapshot, SnapshotSource, ValueRow};
use pagediff::types::Side;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn site(ids: [i64; 3]) -> Snapshot {
    let [root, a, b] = ids;
    page_attributes(Snapshot::new())
        .record(page(root, None, "/"))
        .record(page(a, Some(root), "a"))
        .record(page(b, Some(root), "b"))
        .rows(a, "title", vec![ValueRow::new("A")])
        .rows(b, "title", vec![ValueRow::new("B")])
}

#[tokio::test]
async fn fetch_failure_marks_one_attribute() {
    let (reconciler, exceptions) = reconciler();
    let failing = SnapshotSource::new("source", site([1, 2, 3])).with_failure(2, "title");

    let report = reconciler
        .reconcile(Arc::new(failing), source("target", site([7, 8, 9])))
        .await
        .unwrap();

    assert_eq!(report.equal, vec!["/", "/b"]);
    assert_eq!(
        report.difference_at("/a").unwrap().to_json(),
        json!({"fields": {"title": {
            "sourceValue": {"$unresolved": "FetchFailure"},
            "targetValue": "A"
        }}})
    );
    assert!(report.resolution_failures.is_empty());
    assert_eq!(report.exception_count, 1);
    assert_eq!(exceptions.count("FetchFailure"), 1);
}

#[tokio::test]
async fn cycle_fails_only_the_records_on_it() {
    let (reconciler, exceptions) = reconciler();
    let cyclic = site([1, 2, 3])
        .rows(2, "related", vec![ValueRow::new(3)])
        .rows(3, "related", vec![ValueRow::new(2)]);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        reconciler.reconcile(source("source", cyclic), source("target", site([7, 8, 9]))),
    )
    .await
    .expect("cycle must not hang")
    .unwrap();

    assert_eq!(report.resolution_failures.len(), 2);
    assert!(report
        .resolution_failures
        .iter()
        .all(|f| f.kind == "CyclicReference" && f.side == Side::Source));
    assert_eq!(report.equal, vec!["/"]);
    assert_eq!(exceptions.count("CyclicReference"), 2);
}

#[tokio::test]
async fn unknown_and_ambiguous_attributes_degrade() {
    let (reconciler, exceptions) = reconciler();
    let store = |ids: [i64; 3]| {
        site(ids)
            .attribute(AttributeDefinition::new(1, 3, "palette", "FieldtypeColorPicker", 2))
            .rows(ids[1], "title", vec![ValueRow::new("A"), ValueRow::new("A2")])
    };

    let report = reconciler
        .reconcile(source("source", store([1, 2, 3])), source("target", store([4, 5, 6])))
        .await
        .unwrap();

    // Both sides degrade the same way, so the records still pair up equal.
    assert!(report.is_clean());
    assert_eq!(exceptions.count("UnknownAttributeType"), 6);
    assert_eq!(exceptions.count("MultipleValueRows"), 2);
}

#[tokio::test]
async fn malformed_tree_skips_pairing_but_completes() {
    let (reconciler, exceptions) = reconciler();
    let two_roots = site([1, 2, 3]).record(page(4, None, "other-root"));

    let report = reconciler
        .reconcile(source("source", two_roots), source("target", site([7, 8, 9])))
        .await
        .unwrap();

    assert_eq!(report.tree_errors.len(), 1);
    assert_eq!(report.tree_errors[0].side, Side::Source);
    assert_eq!(report.tree_errors[0].kind, "MalformedTree");
    assert_eq!(report.counts().equal, 0);
    assert_eq!(exceptions.count("MalformedTree"), 1);
}

#[tokio::test]
async fn unreachable_records_are_their_own_class() {
    let (reconciler, exceptions) = reconciler();
    // 5 and 6 point at each other and never reach the root.
    let detached = site([7, 8, 9])
        .record(page(5, Some(6), "loop-a"))
        .record(page(6, Some(5), "loop-b"));

    let report = reconciler
        .reconcile(source("source", site([1, 2, 3])), source("target", detached))
        .await
        .unwrap();

    assert_eq!(report.tree_errors.len(), 1);
    assert_eq!(report.tree_errors[0].kind, "Unreachable");
    assert_eq!(exceptions.count("Unreachable"), 1);
}

#[tokio::test]
async fn bounded_record_concurrency_still_completes() {
    let mut config = ReconcileConfig::default();
    config.resolver.max_concurrent_records = 1;
    let reconciler = Reconciler::new(config, ExceptionLog::in_memory()).unwrap();

    let slow = SnapshotSource::new("source", site([1, 2, 3])).with_latency(Duration::from_millis(5));
    let report = reconciler
        .reconcile(Arc::new(slow), source("target", site([4, 5, 6])))
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.equal, vec!["/", "/a", "/b"]);
}
