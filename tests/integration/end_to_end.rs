use crate::support::{page, page_attributes, reconciler, source};
use pagediff::diff::StructuralDiffer;
use pagediff::store::{ModuleDefinition, Snapshot, ValueRow};
use pagediff::tree::PathBuilder;
use serde_json::json;

fn titled(ids: [i64; 2], title: &str) -> Snapshot {
    let [root, a] = ids;
    page_attributes(Snapshot::new())
        .record(page(root, None, "/"))
        .record(page(a, Some(root), "a"))
        .rows(root, "title", vec![ValueRow::new("Home")])
        .rows(a, "title", vec![ValueRow::new(title)])
}

#[tokio::test]
async fn paths_pair_records_with_different_ids() {
    let (reconciler, _) = reconciler();
    let source_store = titled([1, 2], "Hello");
    let target_store = titled([10, 11], "Hello!");

    let source_paths = PathBuilder::new().build(&source_store.records).unwrap();
    let target_paths = PathBuilder::new().build(&target_store.records).unwrap();
    assert_eq!(source_paths.record_at("/a"), Some(2));
    assert_eq!(target_paths.record_at("/a"), Some(11));

    let source_resolver = reconciler.resolver(source("source", source_store)).await.unwrap();
    let target_resolver = reconciler.resolver(source("target", target_store)).await.unwrap();
    let left = source_resolver.resolve_record(2).await.unwrap();
    let right = target_resolver.resolve_record(11).await.unwrap();

    let difference = StructuralDiffer::default()
        .diff(&left.to_json(), &right.to_json())
        .unwrap();
    assert_eq!(
        difference.to_json(),
        json!({"title": {"sourceValue": "Hello", "targetValue": "Hello!"}})
    );
}

#[tokio::test]
async fn driver_reports_the_changed_title() {
    let (reconciler, exceptions) = reconciler();
    let report = reconciler
        .reconcile(
            source("source", titled([1, 2], "Hello")),
            source("target", titled([10, 11], "Hello!")),
        )
        .await
        .unwrap();

    assert_eq!(report.equal, vec!["/"]);
    assert_eq!(report.unequal.len(), 1);
    assert_eq!(
        report.difference_at("/a").unwrap().to_json(),
        json!({"fields": {"title": {"sourceValue": "Hello", "targetValue": "Hello!"}}})
    );
    assert_eq!(report.exception_count, 0);
    assert_eq!(exceptions.error_count(), 0);
}

fn with_collection(ids: [i64; 4], order: [usize; 2]) -> Snapshot {
    let [root, list, x, y] = ids;
    let members = [x, y];
    page_attributes(Snapshot::new())
        .record(page(root, None, "/"))
        .record(page(list, Some(root), "list"))
        .record(page(x, Some(root), "x"))
        .record(page(y, Some(root), "y"))
        .rows(x, "title", vec![ValueRow::new("X")])
        .rows(y, "title", vec![ValueRow::new("Y")])
        .rows(
            list,
            "related",
            order.iter().map(|&i| ValueRow::new(members[i])).collect(),
        )
}

#[tokio::test]
async fn reversed_collection_is_a_difference() {
    let (reconciler, _) = reconciler();
    let report = reconciler
        .reconcile(
            source("source", with_collection([1, 2, 3, 4], [0, 1])),
            source("target", with_collection([20, 21, 22, 23], [1, 0])),
        )
        .await
        .unwrap();

    assert_eq!(report.equal, vec!["/", "/x", "/y"]);
    let difference = report.difference_at("/list").unwrap().to_json();
    assert_eq!(
        difference["fields"]["related"]["sourceValue"],
        json!([{"title": "X", "related": []}, {"title": "Y", "related": []}])
    );
    assert_eq!(
        difference["fields"]["related"]["targetValue"],
        json!([{"title": "Y", "related": []}, {"title": "X", "related": []}])
    );
}

#[tokio::test]
async fn same_collection_order_is_equal() {
    let (reconciler, _) = reconciler();
    let report = reconciler
        .reconcile(
            source("source", with_collection([1, 2, 3, 4], [1, 0])),
            source("target", with_collection([20, 21, 22, 23], [1, 0])),
        )
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.equal.len(), 4);
}

#[tokio::test]
async fn one_sided_paths_are_bucketed() {
    let (reconciler, _) = reconciler();
    let source_store = titled([1, 2], "Same").record(page(3, Some(1), "retired"));
    let target_store = titled([10, 11], "Same").record(page(12, Some(11), "draft"));

    let report = reconciler
        .reconcile(source("source", source_store), source("target", target_store))
        .await
        .unwrap();
    assert_eq!(report.source_only, vec!["/retired"]);
    assert_eq!(report.target_only, vec!["/a/draft"]);
    assert_eq!(report.equal, vec!["/", "/a"]);
    assert!(report.unequal.is_empty());
}

#[tokio::test]
async fn store_definitions_pair_by_name() {
    let (reconciler, _) = reconciler();
    let module = |id: i64, class: &str| ModuleDefinition {
        id,
        class: class.to_string(),
        flags: 0,
        data: json!({"icon": "file"}),
    };
    let source_store = titled([1, 2], "Same").module(module(30, "ProcessPageEdit"));
    let target_store = titled([10, 11], "Same")
        .module(module(95, "ProcessPageEdit"))
        .module(module(96, "MarkupSitemap"));

    let report = reconciler
        .reconcile(source("source", source_store), source("target", target_store))
        .await
        .unwrap();

    assert_eq!(report.equal, vec!["/", "/a"]);
    assert_eq!(report.modules.equal, vec!["ProcessPageEdit"]);
    assert_eq!(report.modules.target_only, vec!["MarkupSitemap"]);
    assert_eq!(report.attributes.equal, vec!["related", "title"]);
    assert!(!report.is_clean());
    assert_eq!(report.counts().module_mismatches, 1);
}
