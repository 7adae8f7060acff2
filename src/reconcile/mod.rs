//! Reconciliation Driver
//!
//! Loads both stores concurrently, builds each store's path index, resolves
//! every record, then pairs records by path and diffs their documents.
//! A store whose tree cannot be built is reported and left unpaired; a record
//! whose resolution fails is reported and the rest of the store continues.
//! Module, attribute and template definitions are compared by name whether
//! or not the trees could be built.

pub mod definitions;
pub mod outcome;

pub use definitions::{DefinitionComparison, DefinitionDifference, StoreDefinitions};
pub use outcome::{
    tree_error_kind, PathDifference, ReconciliationReport, ReportCounts, ResolutionFailure,
    TreeFailure,
};

use crate::config::{ReconcileConfig, StoreConfig};
use crate::diff::StructuralDiffer;
use crate::error::{ApiError, ResolveError, TreeError};
use crate::exceptions::ExceptionLog;
use crate::resolve::{FieldResolver, ResolvedRecord, StrategyTable};
use crate::store::{Record, RowSource, SnapshotSource, StoreData};
use crate::tree::{PathBuilder, PathIndex};
use crate::types::Side;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Record columns that only make sense inside one store
pub const STORE_LOCAL_COLUMNS: &[&str] = &[
    "id",
    "parent_id",
    "parentId",
    "attribute_set_id",
    "templates_id",
    "created_users_id",
    "modified_users_id",
];

/// Document compared for one record: scalar columns plus template under
/// `record`, resolved attributes under `fields`.
pub fn record_document(record: &Record, resolved: &ResolvedRecord) -> Value {
    let mut scalars: Map<String, Value> = record
        .attributes
        .iter()
        .filter(|(key, _)| !STORE_LOCAL_COLUMNS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(template) = &record.template {
        scalars.insert("template".to_string(), Value::String(template.clone()));
    }
    json!({ "record": scalars, "fields": resolved.to_json() })
}

/// Open the JSON snapshot configured for a store
pub async fn open_snapshot(store: &StoreConfig) -> Result<Arc<dyn RowSource>, ApiError> {
    let path = store.snapshot.as_ref().ok_or_else(|| {
        ApiError::ConfigError(format!("No snapshot configured for store '{}'", store.label))
    })?;
    let source = SnapshotSource::from_file(store.label.clone(), path).await?;
    Ok(Arc::new(source))
}

/// One store after paths and resolution
struct PreparedStore {
    side: Side,
    label: String,
    paths: Result<PathIndex, TreeError>,
    definitions: StoreDefinitions,
    documents: HashMap<String, Value>,
    failures: Vec<ResolutionFailure>,
}

/// Runs a full comparison of two stores
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    exceptions: ExceptionLog,
    strategies: StrategyTable,
    differ: StructuralDiffer,
}

impl Reconciler {
    /// Fails when the configuration does not pass `ReconcileConfig::validate`
    pub fn new(config: ReconcileConfig, exceptions: ExceptionLog) -> Result<Self, ApiError> {
        config.validate()?;
        let strategies = StrategyTable::with_extra(&config.resolver.type_map);
        let differ = StructuralDiffer::with_ignored_keys(config.diff.ignored_keys.iter().cloned());
        Ok(Reconciler {
            config,
            exceptions,
            strategies,
            differ,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn exceptions(&self) -> &ExceptionLog {
        &self.exceptions
    }

    pub fn differ(&self) -> &StructuralDiffer {
        &self.differ
    }

    /// Load a store and build a resolver over it
    pub async fn resolver(&self, source: Arc<dyn RowSource>) -> Result<FieldResolver, ApiError> {
        let store = Arc::new(StoreData::load(source.as_ref()).await?);
        Ok(FieldResolver::new(source, store, self.exceptions.clone())
            .with_strategies(self.strategies.clone())
            .with_max_depth(self.config.resolver.max_depth))
    }

    /// Reconcile the two snapshots named in the configuration
    pub async fn reconcile_configured(&self) -> Result<ReconciliationReport, ApiError> {
        let (source, target) = tokio::try_join!(
            open_snapshot(&self.config.source),
            open_snapshot(&self.config.target)
        )?;
        self.reconcile(source, target).await
    }

    /// Compare two stores.
    ///
    /// Only failures to load rows abort; tree and resolution errors end up
    /// in the report.
    pub async fn reconcile(
        &self,
        source: Arc<dyn RowSource>,
        target: Arc<dyn RowSource>,
    ) -> Result<ReconciliationReport, ApiError> {
        let errors_before = self.exceptions.error_count();

        let (source, target) = tokio::try_join!(
            self.prepare(Side::Source, source),
            self.prepare(Side::Target, target)
        )?;

        let mut report = ReconciliationReport::new(&source.label, &target.label);
        report.resolution_failures.extend(source.failures.iter().cloned());
        report.resolution_failures.extend(target.failures.iter().cloned());
        let (ours, theirs) = (&source.definitions, &target.definitions);
        report.modules = DefinitionComparison::compare(&self.differ, &ours.modules, &theirs.modules);
        report.attributes =
            DefinitionComparison::compare(&self.differ, &ours.attributes, &theirs.attributes);
        report.templates =
            DefinitionComparison::compare(&self.differ, &ours.templates, &theirs.templates);

        match (&source.paths, &target.paths) {
            (Ok(source_paths), Ok(target_paths)) => self.pair(
                (source_paths, &source.documents),
                (target_paths, &target.documents),
                &mut report,
            ),
            _ => {
                for store in [&source, &target] {
                    if let Err(err) = &store.paths {
                        report
                            .tree_errors
                            .push(TreeFailure::new(store.side, &store.label, err));
                    }
                }
            }
        }

        report.exception_count = self.exceptions.error_count().saturating_sub(errors_before);
        self.exceptions.flush();

        let counts = report.counts();
        info!(
            source_only = counts.source_only,
            target_only = counts.target_only,
            equal = counts.equal,
            unequal = counts.unequal,
            resolution_failures = counts.resolution_failures,
            tree_errors = counts.tree_errors,
            module_mismatches = counts.module_mismatches,
            attribute_mismatches = counts.attribute_mismatches,
            template_mismatches = counts.template_mismatches,
            exceptions = report.exception_count,
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn prepare(&self, side: Side, source: Arc<dyn RowSource>) -> Result<PreparedStore, ApiError> {
        let label = source.label().to_string();
        self.exceptions.note(format!("store is: {}", label));
        let resolver = self.resolver(source).await?;
        let definitions = StoreDefinitions::collect(resolver.store());

        let paths = match PathBuilder::new().build(resolver.store().records()) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(store = %label, error = %err, "Tree could not be built, skipping store");
                self.exceptions
                    .record(tree_error_kind(&err), format!("{} store: {}", label, err));
                return Ok(PreparedStore {
                    side,
                    label,
                    paths: Err(err),
                    definitions,
                    documents: HashMap::new(),
                    failures: Vec::new(),
                });
            }
        };
        info!(store = %label, records = paths.len(), "Resolving records");

        let semaphore = Semaphore::new(self.config.resolver.max_concurrent_records);
        let (semaphore, resolver_ref) = (&semaphore, &resolver);
        let pending = paths.iter().map(|(path, id)| async move {
            let result = match semaphore.acquire().await {
                Ok(_permit) => resolver_ref.resolve_record(id).await,
                Err(_) => Err(ResolveError::TaskFailed("record semaphore closed".to_string())),
            };
            (path, id, result)
        });

        let mut documents = HashMap::with_capacity(paths.len());
        let mut failures = Vec::new();
        for (path, id, result) in join_all(pending).await {
            match (result, resolver.store().record(id)) {
                (Ok(resolved), Some(record)) => {
                    documents.insert(path.to_string(), record_document(record, &resolved));
                }
                (Ok(_), None) => {}
                (Err(err), _) => {
                    warn!(store = %label, path, record_id = id, error = %err, "Record resolution failed");
                    failures.push(ResolutionFailure::new(side, path, id, &err));
                }
            }
        }
        info!(
            store = %label,
            resolved = documents.len(),
            failed = failures.len(),
            "Store resolved"
        );

        Ok(PreparedStore {
            side,
            label,
            paths: Ok(paths),
            definitions,
            documents,
            failures,
        })
    }

    /// Source traversal order first, then paths only the target has
    fn pair(
        &self,
        (source_paths, source_docs): (&PathIndex, &HashMap<String, Value>),
        (target_paths, target_docs): (&PathIndex, &HashMap<String, Value>),
        report: &mut ReconciliationReport,
    ) {
        for (path, _) in source_paths.iter() {
            if target_paths.record_at(path).is_none() {
                report.source_only.push(path.to_string());
                continue;
            }
            // A side without a document failed resolution and is reported already.
            if let (Some(source), Some(target)) = (source_docs.get(path), target_docs.get(path)) {
                match self.differ.diff(source, target) {
                    None => report.equal.push(path.to_string()),
                    Some(difference) => report.unequal.push(PathDifference {
                        path: path.to_string(),
                        difference,
                    }),
                }
            }
        }
        for (path, _) in target_paths.iter() {
            if source_paths.record_at(path).is_none() {
                report.target_only.push(path.to_string());
            }
        }
    }
}
