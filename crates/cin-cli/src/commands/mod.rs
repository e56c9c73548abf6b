//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod serve;

use std::path::Path;

use cin_core::CinConfig;

/// Load the configuration from `path`, the default location, or defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<CinConfig> {
    if let Some(path) = path {
        return Ok(CinConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(CinConfig::from_file(&default_path)?)
    } else {
        Ok(CinConfig::default())
    }
}
