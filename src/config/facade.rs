//! Entry points for loading configuration.

use crate::config::merge::merge_policy;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::BulkgenConfig;
use crate::error::RunError;
use config::File;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace: defaults, global file, workspace
    /// files, then environment variables.
    pub fn load(workspace_root: &Path) -> Result<BulkgenConfig, RunError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        Self::finish(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from one explicit file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<BulkgenConfig, RunError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        Self::finish(builder.build()?.try_deserialize()?)
    }

    /// Path of the global config file, if a config home can be determined.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    pub fn default() -> BulkgenConfig {
        BulkgenConfig::default()
    }

    fn finish(config: BulkgenConfig) -> Result<BulkgenConfig, RunError> {
        config.validate().map_err(|errors| {
            RunError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(config)
    }
}
