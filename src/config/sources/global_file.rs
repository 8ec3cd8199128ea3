//! Global config file source: $XDG_CONFIG_HOME/bulkgen/config.toml or ~/.config/bulkgen/config.toml

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::PathBuf;
use tracing::debug;

/// Path to global config file.
pub fn global_config_path() -> Option<PathBuf> {
    xdg_root::config_home().map(|dir| dir.join("bulkgen").join("config.toml"))
}

/// Add global config file source to builder if it exists.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let canonical = global_path
                .canonicalize()
                .unwrap_or_else(|_| global_path.clone());
            builder = builder.add_source(File::from(canonical).required(false));
        } else {
            debug!(
                config_path = %global_path.display(),
                "no global configuration file"
            );
        }
    }
    Ok(builder)
}
