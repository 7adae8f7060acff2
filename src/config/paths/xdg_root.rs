//! XDG Base Directory lookup for the global config file.

use std::path::PathBuf;

/// Application directory name under the XDG roots
pub const APP_DIR: &str = "pagediff";

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config")),
    }
}

/// `$XDG_CONFIG_HOME/pagediff/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    config_home().map(|dir| dir.join(APP_DIR).join("config.toml"))
}
