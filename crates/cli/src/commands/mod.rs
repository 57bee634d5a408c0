pub mod config_cmd;
pub mod providers;
pub mod research;

use anyhow::Context;
use sleuth_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file in use: the `--config` override or the default path.
pub fn config_file(override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(override_path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_file(override_path);
    AppConfig::load_with_overrides(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
