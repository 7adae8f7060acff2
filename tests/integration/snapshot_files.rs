use pagediff::config::ConfigLoader;
use pagediff::exceptions::ExceptionLog;
use pagediff::reconcile::Reconciler;
use pagediff::report::format_report_text;
use serde_json::{json, Value};
use std::path::Path;

fn snapshot(root: i64, about: i64, title: Value) -> Value {
    json!({
        "records": [
            {"id": root, "parentId": 0, "attributeSetId": 1, "name": "home", "template": "home",
             "status": 1, "modified": "2016-01-01 10:00:00"},
            {"id": about, "parentId": root, "attributeSetId": 1, "name": "about", "template": "basic-page",
             "status": 1, "modified": "2016-02-02 10:00:00"}
        ],
        "attributes": [
            {"attributeSetId": 1, "attributeId": 1, "attributeName": "title",
             "typeTag": "FieldtypePageTitle", "ordinal": 0},
            {"attributeSetId": 1, "attributeId": 2, "attributeName": "images",
             "typeTag": "FieldtypeImage", "ordinal": 1}
        ],
        "values": {
            root.to_string(): {"title": [{"data": "Home"}]},
            about.to_string(): {
                "title": [{"data": title}],
                "images": [
                    {"data": "b.jpg", "sort": 1, "description": "second", "modified": "2017-01-01"},
                    {"data": "a.jpg", "sort": 0, "description": "first", "modified": "2016-01-01"}
                ]
            }
        }
    })
}

fn write(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn configured_run_writes_the_exception_log() {
    let dir = tempfile::tempdir().unwrap();
    let live = write(dir.path(), "live.json", &snapshot(1, 2, json!("About")));
    let staging = write(dir.path(), "staging.json", &snapshot(40, 41, json!("About us")));
    let exceptions_path = dir.path().join("logs").join("exceptions");
    let config_path = dir.path().join("pagediff.toml");
    std::fs::write(
        &config_path,
        format!(
            "[source]\nsnapshot = {:?}\nlabel = \"live\"\n\n[target]\nsnapshot = {:?}\nlabel = \"staging\"\n",
            live, staging
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_path).unwrap();
    let exceptions = ExceptionLog::to_file(&exceptions_path, false).unwrap();
    let reconciler = Reconciler::new(config.clone(), exceptions).unwrap();
    let report = reconciler.reconcile_configured().await.unwrap();

    assert_eq!(report.source_label, "live");
    assert_eq!(report.equal, vec!["/"]);
    assert_eq!(
        report.difference_at("/about").unwrap().to_json(),
        json!({"fields": {"title": {"sourceValue": "About", "targetValue": "About us"}}})
    );

    let text = format_report_text(&report, &config.report);
    assert!(text.contains("/about"));
    assert!(text.contains("About us"));

    let log = std::fs::read_to_string(&exceptions_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.contains(" INFO store is: ")));
}
