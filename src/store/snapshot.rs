//! JSON snapshot row source
//!
//! Serves the row queries from a document previously dumped from a store:
//!
//! ```json
//! { "records": [...], "attributes": [...],
//!   "values": { "<recordId>": { "<attribute>": [rows] } },
//!   "modules": [...] }
//! ```

use super::{AttributeDefinition, ModuleDefinition, Record, RowSource, ValueRow};
use crate::error::SourceError;
use crate::types::RecordId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Whole-store dump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub values: BTreeMap<RecordId, BTreeMap<String, Vec<ValueRow>>>,
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    pub fn rows(mut self, record_id: RecordId, attribute: &str, rows: Vec<ValueRow>) -> Self {
        self.values
            .entry(record_id)
            .or_default()
            .insert(attribute.to_string(), rows);
        self
    }

    pub fn module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, SourceError> {
        serde_json::from_str(text).map_err(|e| SourceError::Snapshot(e.to_string()))
    }
}

/// `RowSource` backed by an in-memory `Snapshot`
#[derive(Debug)]
pub struct SnapshotSource {
    label: String,
    snapshot: Snapshot,
    failures: HashSet<(RecordId, String)>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl SnapshotSource {
    pub fn new(label: impl Into<String>, snapshot: Snapshot) -> Self {
        SnapshotSource {
            label: label.into(),
            snapshot,
            failures: HashSet::new(),
            latency: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Load a snapshot document from disk
    pub async fn from_file(label: impl Into<String>, path: &Path) -> Result<Self, SourceError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SourceError::Snapshot(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let snapshot = Snapshot::from_json(&text).map_err(|e| {
            SourceError::Snapshot(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Self::new(label, snapshot))
    }

    /// Make every value-row query for (record, attribute) fail
    pub fn with_failure(mut self, record_id: RecordId, attribute: &str) -> Self {
        self.failures.insert((record_id, attribute.to_string()));
        self
    }

    /// Delay each value-row query, yielding to the runtime
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of value-row queries served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

#[async_trait]
impl RowSource for SnapshotSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError> {
        Ok(self.snapshot.records.clone())
    }

    async fn fetch_attribute_definitions(&self) -> Result<Vec<AttributeDefinition>, SourceError> {
        let mut definitions = self.snapshot.attributes.clone();
        definitions.sort_by_key(|d| (d.attribute_set_id, d.ordinal));
        Ok(definitions)
    }

    async fn fetch_value_rows(
        &self,
        record_id: RecordId,
        attribute_name: &str,
    ) -> Result<Vec<ValueRow>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self
            .failures
            .contains(&(record_id, attribute_name.to_string()))
        {
            return Err(SourceError::Query(format!(
                "select from field_{} where record_id = {} failed",
                attribute_name.to_lowercase(),
                record_id
            )));
        }

        let rows = self
            .snapshot
            .values
            .get(&record_id)
            .and_then(|attrs| attrs.get(attribute_name))
            .cloned()
            .unwrap_or_default();
        debug!(
            store = %self.label,
            record_id,
            attribute = attribute_name,
            rows = rows.len(),
            "Fetched value rows"
        );
        Ok(rows)
    }

    async fn fetch_modules(&self) -> Result<Vec<ModuleDefinition>, SourceError> {
        Ok(self.snapshot.modules.clone())
    }
}
