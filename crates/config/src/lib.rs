//! Configuration loading, validation, and management for Stratum.
//!
//! Loads configuration from `~/.stratum/config.toml` with environment
//! variable overrides. The configuration names the layers an application
//! activates process-wide at startup and the default log level.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use stratum_core::{ConfigurationError, Error, Layer, LayerCatalog, global_activate_layer};

/// The root configuration structure.
///
/// Maps directly to `~/.stratum/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StratumConfig {
    /// Layer declarations
    #[serde(default)]
    pub layers: LayersConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayersConfig {
    /// Layers activated process-wide at startup, in precedence order
    #[serde(default)]
    pub base: Vec<String>,

    /// Additional layer names to register without activating
    #[serde(default)]
    pub known: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl StratumConfig {
    /// Load configuration from the default path (~/.stratum/config.toml).
    ///
    /// Environment overrides:
    /// - `STRATUM_BASE_LAYERS` (comma separated, replaces `layers.base`)
    /// - `STRATUM_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(layers) = lookup("STRATUM_BASE_LAYERS") {
            self.layers.base = layers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = lookup("STRATUM_LOG_LEVEL") {
            self.logging.level = level.trim().to_lowercase();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stratum")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = self.layers.base.iter().chain(self.layers.known.iter());
        if names.clone().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "layer names must not be empty".into(),
            ));
        }

        for (i, name) in self.layers.base.iter().enumerate() {
            if self.layers.base[..i].contains(name) {
                return Err(ConfigError::ValidationError(format!(
                    "base layer '{name}' is listed more than once"
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Register every configured layer name in `catalog`.
    pub fn register_layers(&self, catalog: &LayerCatalog) -> Vec<Layer> {
        self.layers
            .known
            .iter()
            .chain(self.layers.base.iter())
            .map(|name| catalog.get_or_create(name))
            .collect()
    }

    /// Globally activate the configured base layers, skipping ones that are
    /// already active. Returns the base layers in configured order.
    pub fn apply(&self, catalog: &LayerCatalog) -> Result<Vec<Layer>, ConfigError> {
        self.register_layers(catalog);
        let mut activated = Vec::with_capacity(self.layers.base.len());
        for name in &self.layers.base {
            let layer = catalog.get_or_create(name);
            match global_activate_layer(&layer) {
                Ok(_) => {}
                Err(Error::Configuration(ConfigurationError::LayerAlreadyActive { .. })) => {
                    tracing::debug!(layer = %name, "Base layer already active");
                }
                Err(e) => return Err(e.into()),
            }
            activated.push(layer);
        }
        tracing::info!(base = activated.len(), "Applied base layers from config");
        Ok(activated)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to activate configured layers: {0}")]
    Activation(#[from] Error),
}
