//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{check_config, log_remarks};

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "server.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} is neither valid TOML nor valid JSON", .0.display())]
    UnknownFormat(PathBuf),

    #[error("configuration has {count} critical problem(s)")]
    Critical { count: usize },
}

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    /// Detect from content: TOML first, then JSON.
    Unknown,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Unknown,
        }
    }
}

/// Parse configuration text in the given format.
pub fn parse_config(content: &str, format: ConfigFormat, path: &Path) -> Result<AppConfig, ConfigError> {
    match format {
        ConfigFormat::Toml => Ok(toml::from_str(content)?),
        ConfigFormat::Json => Ok(serde_json::from_str(content)?),
        ConfigFormat::Unknown => toml::from_str(content)
            .or_else(|_| serde_json::from_str(content))
            .map_err(|_| ConfigError::UnknownFormat(path.to_path_buf())),
    }
}

/// Read and parse a configuration file without validating it.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, ConfigFormat::from_path(path), path)
}

/// The file `load_config` reads: `path`, else `server.toml` in the working
/// directory if present. `None` means the defaults are used.
pub fn config_source(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.is_file().then(|| default.to_path_buf())
        }
    }
}

/// Load a configuration file.
///
/// With no path, `server.toml` in the working directory is used if present,
/// otherwise the defaults. Runs before logging is set up, so it logs nothing.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match config_source(path) {
        Some(source) => read_config(&source),
        None => Ok(AppConfig::default()),
    }
}

/// Validate a configuration and log its remarks. Fails on critical remarks.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let remarks = check_config(config);
    match log_remarks(&remarks) {
        0 => Ok(()),
        count => Err(ConfigError::Critical { count }),
    }
}
