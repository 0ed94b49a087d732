pub mod config_cmd;
pub mod demo;
pub mod layers;

use std::path::Path;

use stratum_config::{ConfigError, StratumConfig};

/// Load the config from `path`, or from the default location when absent.
///
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<StratumConfig, ConfigError> {
    match path {
        None => StratumConfig::load(),
        Some(path) => {
            let mut config = StratumConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
    }
}

/// Resolved config file location.
pub fn config_file(path: Option<&Path>) -> std::path::PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| StratumConfig::config_dir().join("config.toml"))
}
