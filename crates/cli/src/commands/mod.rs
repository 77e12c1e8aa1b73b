pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod rules;
pub mod serve;

use parley_config::AppConfig;
use std::path::{Path, PathBuf};

pub type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The config file in effect: `--config` or the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, String> {
    AppConfig::load_with_env(&config_file(path)).map_err(|e| format!("Failed to load config: {e}"))
}
