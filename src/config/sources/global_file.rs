//! Global file source: `$XDG_CONFIG_HOME/pagediff/config.toml`, optional.

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use tracing::debug;

/// Add the global config file to builder when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = match xdg_root::global_config_path() {
        Some(path) if path.is_file() => path,
        _ => return Ok(builder),
    };
    let name = match path.to_str() {
        Some(name) => name.to_string(),
        None => return Ok(builder),
    };
    debug!(path = %name, "Loading global config file");
    Ok(builder.add_source(File::new(&name, FileFormat::Toml).required(false)))
}
