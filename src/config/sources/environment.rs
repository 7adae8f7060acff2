//! Environment variable source: PAGEDIFF_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "PAGEDIFF";

/// Add environment variable overlay to builder.
/// `PAGEDIFF__RESOLVER__MAX_DEPTH=8` sets `resolver.max_depth`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("diff.ignored_keys")
            .with_list_parse_key("report.exclude_prefixes"),
    ))
}
