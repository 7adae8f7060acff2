//! Source composition for `ReconcileConfig`.

pub mod service;

/// Builder seeded with the serialized defaults, so every later source only
/// needs to carry the keys it overrides.
pub(crate) mod merge_policy {
    use crate::config::ReconcileConfig;
    use config::builder::DefaultState;
    use config::{Config, ConfigBuilder, ConfigError};

    pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Config::try_from(&ReconcileConfig::default())?;
        Ok(Config::builder().add_source(defaults))
    }
}
