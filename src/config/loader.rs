//! Configuration loading from disk.
//!
//! Lookup order: explicit path argument, then `LEGACY_CORE_CONFIG`, then
//! built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::CoreConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LEGACY_CORE_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CoreConfig, ConfigError> {
    parse_named(content, "inline config")
}

fn parse_named(content: &str, origin: &str) -> Result<CoreConfig, ConfigError> {
    let config: CoreConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CoreConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_named(&content, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}

/// Pick the config file to use: `explicit` wins over `env_value`.
pub fn resolve_path(explicit: Option<PathBuf>, env_value: Option<String>) -> Option<PathBuf> {
    explicit.or_else(|| env_value.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
}

/// Load from `explicit` or `LEGACY_CORE_CONFIG`, falling back to defaults.
pub fn load_or_default(explicit: Option<PathBuf>) -> Result<CoreConfig, ConfigError> {
    match resolve_path(explicit, std::env::var(CONFIG_ENV).ok()) {
        Some(path) => load_config(&path),
        None => Ok(CoreConfig::default()),
    }
}
