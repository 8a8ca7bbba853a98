//! Collector configuration
//!
//! Loaded from TOML (see [`ma_common::config::load_toml_or_default`]); every
//! field has a built-in default so an absent file yields a working tracker.

use ma_common::attribution::DEFAULT_PREFIX;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default config file name under the platform config directory
pub const TRACKER_CONFIG_FILE: &str = "tracker.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Collection endpoint receiving `{site_id, events}` batches
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_site_id")]
    pub site_id: String,

    /// Durable-store key of the visitor id
    #[serde(default = "default_visitor_key")]
    pub visitor_key: String,

    /// Durable-store key of the session id
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Tab-store key of the saved attribution set
    #[serde(default = "default_attribution_key")]
    pub attribution_key: String,

    /// Durable-store key of the utm_id → utm_content cache
    #[serde(default = "default_content_cache_key")]
    pub content_cache_key: String,

    /// Prefix shared by recognized campaign parameters
    #[serde(default = "default_attribution_prefix")]
    pub attribution_prefix: String,

    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,

    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    #[serde(default = "default_visitor_lifetime_days")]
    pub visitor_lifetime_days: u64,

    /// Extend the session entry on every tracked activity
    #[serde(default = "default_true")]
    pub sliding_session: bool,

    /// Failed flushes an event survives before it is dropped (0 = unbounded)
    #[serde(default = "default_max_flush_attempts")]
    pub max_flush_attempts: u32,

    #[serde(default = "default_content_cache_capacity")]
    pub content_cache_capacity: usize,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// Durable store selection
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Backing file for the `file` backend (defaults under the local data dir)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file surviving restarts
    #[default]
    File,
    /// Process memory only
    Memory,
    /// Storage blocked; every access fails
    Disabled,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Whether the unload-safe primitive is available
    #[serde(default = "default_true")]
    pub beacon: bool,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            beacon: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_id: default_site_id(),
            visitor_key: default_visitor_key(),
            session_key: default_session_key(),
            attribution_key: default_attribution_key(),
            content_cache_key: default_content_cache_key(),
            attribution_prefix: default_attribution_prefix(),
            batch_interval_ms: default_batch_interval_ms(),
            session_timeout_ms: default_session_timeout_ms(),
            visitor_lifetime_days: default_visitor_lifetime_days(),
            sliding_session: true,
            max_flush_attempts: default_max_flush_attempts(),
            content_cache_capacity: default_content_cache_capacity(),
            storage: StorageConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms.max(1))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn visitor_lifetime(&self) -> Duration {
        Duration::from_secs(self.visitor_lifetime_days * 24 * 60 * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.request_timeout_ms)
    }
}

fn default_api_url() -> String {
    "https://moadamda-analytics.co.kr/api/track".to_string()
}

fn default_site_id() -> String {
    "moadamda".to_string()
}

fn default_visitor_key() -> String {
    "_ma_id".to_string()
}

fn default_session_key() -> String {
    "_ma_ses".to_string()
}

fn default_attribution_key() -> String {
    "_ma_utm_params".to_string()
}

fn default_content_cache_key() -> String {
    "_ma_utm_content_cache".to_string()
}

fn default_attribution_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_batch_interval_ms() -> u64 {
    180_000 // 3 minutes
}

fn default_session_timeout_ms() -> u64 {
    1_800_000 // 30 minutes
}

fn default_visitor_lifetime_days() -> u64 {
    730 // 2 years
}

fn default_max_flush_attempts() -> u32 {
    5
}

fn default_content_cache_capacity() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}
