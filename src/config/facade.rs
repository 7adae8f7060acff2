//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::ReconcileConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from standard sources, plus `path` when given.
    pub fn load(path: Option<&Path>) -> Result<ReconcileConfig, ApiError> {
        let config = MergeService::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from one file with environment overlay, skipping
    /// the global file.
    pub fn load_from_file(path: &Path) -> Result<ReconcileConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> ReconcileConfig {
        ReconcileConfig::default()
    }
}
