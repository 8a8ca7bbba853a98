//! Repair job configuration

use ma_common::config::LoggingConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Default config file name under the platform config directory
pub const REPAIR_CONFIG_FILE: &str = "repair.toml";

/// Default database file name under the platform data directory
pub const DEFAULT_DATABASE_FILE: &str = "analytics.db";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RepairConfig {
    /// SQLite database holding `sessions` and `utm_sessions`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Log every n-th success after the first few
    #[serde(default = "default_batch_log_every")]
    pub batch_log_every: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            batch_log_every: default_batch_log_every(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RepairConfig {
    /// Database path in priority order: CLI, config file, platform data dir
    pub fn resolve_database_path(&self, cli_arg: Option<PathBuf>) -> Option<PathBuf> {
        cli_arg
            .or_else(|| self.database_path.clone())
            .or_else(|| dirs::data_local_dir().map(|d| d.join("ma").join(DEFAULT_DATABASE_FILE)))
    }
}

fn default_batch_log_every() -> usize {
    50
}
