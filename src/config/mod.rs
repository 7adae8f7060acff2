//! Configuration
//!
//! `ReconcileConfig` is layered by `ConfigLoader`: built-in defaults, the
//! global file (`$XDG_CONFIG_HOME/pagediff/config.toml`), an explicit file,
//! then `PAGEDIFF__SECTION__KEY` environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::diff::MODIFIED_KEY;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::resolve::{StrategyKind, DEFAULT_MAX_DEPTH};
use crate::types::Side;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One store to compare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot the store is read from
    #[serde(default)]
    pub snapshot: Option<PathBuf>,

    /// Label used in logs and the report
    pub label: String,
}

impl StoreConfig {
    pub fn for_side(side: Side) -> Self {
        StoreConfig {
            snapshot: None,
            label: side.as_str().to_string(),
        }
    }
}

fn default_source() -> StoreConfig {
    StoreConfig::for_side(Side::Source)
}

fn default_target() -> StoreConfig {
    StoreConfig::for_side(Side::Target)
}

/// Field resolution limits and type table extensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum reference nesting below a top-level record
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Top-level record resolutions in flight per store
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,

    /// Extra type tag → strategy entries
    #[serde(default)]
    pub type_map: HashMap<String, StrategyKind>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_concurrent_records() -> usize {
    16
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrent_records: default_max_concurrent_records(),
            type_map: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Keys never compared, at any depth
    #[serde(default = "default_ignored_keys")]
    pub ignored_keys: Vec<String>,
}

fn default_ignored_keys() -> Vec<String> {
    vec![MODIFIED_KEY.to_string()]
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            ignored_keys: default_ignored_keys(),
        }
    }
}

/// Report rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List equal records too
    #[serde(default)]
    pub show_equal: bool,

    /// Paths whose descendants are left out of the rendered report
    #[serde(default)]
    pub exclude_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionsConfig {
    /// Exception log file; `None` keeps events in memory only
    #[serde(default = "default_exceptions_file")]
    pub file: Option<PathBuf>,

    /// Append to an existing file instead of truncating it
    #[serde(default)]
    pub append: bool,
}

fn default_exceptions_file() -> Option<PathBuf> {
    Some(PathBuf::from("./exceptions"))
}

impl Default for ExceptionsConfig {
    fn default() -> Self {
        Self {
            file: default_exceptions_file(),
            append: false,
        }
    }
}

/// Complete configuration for one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_source")]
    pub source: StoreConfig,

    #[serde(default = "default_target")]
    pub target: StoreConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub diff: DiffConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub exceptions: ExceptionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            target: default_target(),
            resolver: ResolverConfig::default(),
            diff: DiffConfig::default(),
            report: ReportConfig::default(),
            exceptions: ExceptionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn store(&self, side: Side) -> &StoreConfig {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.resolver.max_depth == 0 {
            return Err(ApiError::ConfigError(
                "resolver.max_depth must be at least 1".to_string(),
            ));
        }
        if self.resolver.max_concurrent_records == 0 {
            return Err(ApiError::ConfigError(
                "resolver.max_concurrent_records must be at least 1".to_string(),
            ));
        }
        if self.source.label == self.target.label {
            return Err(ApiError::ConfigError(format!(
                "source and target share the label '{}'",
                self.source.label
            )));
        }
        Ok(())
    }
}
