//! Configuration loading and config file resolution
//!
//! Each binary and library owns its own config struct; this module supplies
//! the shared pieces: logging settings, config path resolution and TOML
//! loading with graceful fallback to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted when no config path is given on the command line
pub const CONFIG_ENV_VAR: &str = "MA_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config directory (`<config_dir>/ma/<file_name>`), if it exists
/// 4. None: caller falls back to compiled defaults
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    let candidate = default_config_dir().map(|d| d.join(file_name))?;
    if candidate.exists() {
        Some(candidate)
    } else {
        None
    }
}

/// `<platform config dir>/ma`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ma"))
}

/// Load a TOML config file, falling back to defaults when it is missing
///
/// A missing file (or no path at all) is not an error: a warning is logged
/// and `T::default()` is returned. A file that exists but does not parse is
/// an error.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file given, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file not found: {} (using built-in defaults)", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
