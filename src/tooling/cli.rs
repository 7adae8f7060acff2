//! CLI Tooling
//!
//! Command-line interface for reconciliation runs and for inspecting a
//! single store snapshot.

use crate::config::{ConfigLoader, ReconcileConfig};
use crate::diff::StructuralDiffer;
use crate::error::ApiError;
use crate::exceptions::ExceptionLog;
use crate::logging::LoggingConfig;
use crate::reconcile::Reconciler;
use crate::report::{format_report_json, format_report_text, format_section_heading};
use crate::store::{RowSource, SnapshotSource, StoreData};
use crate::tree::PathBuilder;
use crate::types::RecordId;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Pagediff CLI - compare two hierarchical record stores
#[derive(Parser, Debug)]
#[command(name = "pagediff")]
#[command(about = "Reconcile two hierarchical record stores by path")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging settings from the config file with flag overrides applied
    pub fn logging_config(&self, base: &LoggingConfig) -> Result<LoggingConfig, ApiError> {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.parse()?;
        }
        if let Some(output) = &self.log_output {
            config.output = output.parse()?;
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Reconcile the source and target stores and print the report
    Compare {
        /// Source snapshot (overrides source.snapshot)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Target snapshot (overrides target.snapshot)
        #[arg(long)]
        target: Option<PathBuf>,
        /// List equal records too
        #[arg(long)]
        showall: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Resolve one record of a snapshot and print it as JSON
    Resolve {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        record: RecordId,
    },
    /// Print every path of a snapshot in traversal order
    Paths {
        #[arg(long)]
        snapshot: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Structurally diff two JSON documents
    Diff {
        a: PathBuf,
        b: PathBuf,
        /// Extra keys to ignore at every depth
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Compare { .. } => "compare",
        Commands::Resolve { .. } => "resolve",
        Commands::Paths { .. } => "paths",
        Commands::Diff { .. } => "diff",
    }
}

fn check_format(format: &str) -> Result<(), ApiError> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(ApiError::ConfigError(format!(
            "Invalid format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}

/// Store label derived from a snapshot file name
fn snapshot_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "snapshot".to_string())
}

async fn read_json(path: &Path) -> Result<Value, ApiError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

/// CLI context for executing commands
#[derive(Debug, Clone)]
pub struct CliContext {
    config: ReconcileConfig,
    config_path: Option<PathBuf>,
}

impl CliContext {
    /// Create a new CLI context from layered configuration
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Context over an already loaded configuration
    pub fn with_config(config: ReconcileConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Execute a CLI command on a fresh multi-threaded runtime
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute_async(command))
    }

    /// Execute a CLI command on the current runtime
    pub async fn execute_async(&self, command: &Commands) -> Result<String, ApiError> {
        info!(command = command_name(command), "Executing command");
        match command {
            Commands::Compare {
                source,
                target,
                showall,
                format,
            } => {
                self.compare(source.as_deref(), target.as_deref(), *showall, format)
                    .await
            }
            Commands::Resolve { snapshot, record } => self.resolve(snapshot, *record).await,
            Commands::Paths { snapshot, format } => self.paths(snapshot, format).await,
            Commands::Diff { a, b, ignore } => self.diff(a, b, ignore).await,
        }
    }

    fn exception_log(&self) -> Result<ExceptionLog, ApiError> {
        match &self.config.exceptions.file {
            Some(path) => ExceptionLog::to_file(path, self.config.exceptions.append),
            None => Ok(ExceptionLog::in_memory()),
        }
    }

    async fn compare(
        &self,
        source: Option<&Path>,
        target: Option<&Path>,
        showall: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        check_format(format)?;
        let mut config = self.config.clone();
        if let Some(path) = source {
            config.source.snapshot = Some(path.to_path_buf());
        }
        if let Some(path) = target {
            config.target.snapshot = Some(path.to_path_buf());
        }
        if showall {
            config.report.show_equal = true;
        }
        config.validate()?;

        let reconciler = Reconciler::new(config.clone(), self.exception_log()?)?;
        let report = reconciler.reconcile_configured().await?;
        if format == "json" {
            format_report_json(&report, &config.report)
        } else {
            Ok(format_report_text(&report, &config.report))
        }
    }

    async fn resolve(&self, snapshot: &Path, record: RecordId) -> Result<String, ApiError> {
        let source: Arc<dyn RowSource> =
            Arc::new(SnapshotSource::from_file(snapshot_label(snapshot), snapshot).await?);
        let reconciler = Reconciler::new(self.config.clone(), self.exception_log()?)?;
        let resolver = reconciler.resolver(source).await?;

        let (result, stats) = resolver.resolve_record_with_stats(record).await;
        info!(
            record_id = record,
            records = stats.records,
            fetches = stats.fetches,
            peak_outstanding = stats.peak_outstanding,
            "Resolved record"
        );
        reconciler.exceptions().flush();
        let resolved = result?;
        Ok(serde_json::to_string_pretty(&resolved.to_json())?)
    }

    async fn paths(&self, snapshot: &Path, format: &str) -> Result<String, ApiError> {
        check_format(format)?;
        let source = SnapshotSource::from_file(snapshot_label(snapshot), snapshot).await?;
        let store = StoreData::load(&source).await?;
        let paths = PathBuilder::new().build(store.records())?;

        if format == "json" {
            let rows: Vec<Value> = paths
                .iter()
                .map(|(path, id)| json!({ "path": path, "record_id": id }))
                .collect();
            return Ok(serde_json::to_string_pretty(&rows)?);
        }

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Path", "Record"]);
        for (path, id) in paths.iter() {
            table.add_row(vec![path.to_string(), id.to_string()]);
        }
        Ok(format!(
            "{}\n\n{}\n\nTotal: {} records.",
            format_section_heading(&format!("Paths in {}", source.label())),
            table,
            paths.len()
        ))
    }

    async fn diff(&self, a: &Path, b: &Path, ignore: &[String]) -> Result<String, ApiError> {
        let (left, right) = tokio::try_join!(read_json(a), read_json(b))?;
        let differ = StructuralDiffer::with_ignored_keys(
            self.config
                .diff
                .ignored_keys
                .iter()
                .chain(ignore.iter())
                .cloned(),
        );
        match differ.diff(&left, &right) {
            Some(difference) => Ok(serde_json::to_string_pretty(&difference.to_json())?),
            None => Ok("no differences".to_string()),
        }
    }
}
