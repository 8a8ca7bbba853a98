//! Tests for config path resolution and TOML loading with defaults
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MA_CONFIG are marked with #[serial].

use ma_common::config::{load_toml_or_default, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, PartialEq)]
struct SampleConfig {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let cli = Path::new("/tmp/from-cli.toml");
    let resolved = resolve_config_path(Some(cli), CONFIG_ENV_VAR, "x.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR, "x.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_nothing_configured_resolves_to_none() {
    env::remove_var(CONFIG_ENV_VAR);

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR, "surely-not-present-ma-test.toml");
    assert_eq!(resolved, None);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config: SampleConfig =
        load_toml_or_default(Some(Path::new("/nonexistent/ma/config.toml"))).unwrap();
    assert_eq!(config, SampleConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_no_path_falls_back_to_defaults() {
    let config: SampleConfig = load_toml_or_default(None).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_partial_file_keeps_field_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name = \"tracker\"\n\n[logging]\nfile = \"/var/log/ma.log\"\n").unwrap();

    let config: SampleConfig = load_toml_or_default(Some(&path)).unwrap();
    assert_eq!(config.name, "tracker");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/ma.log")));
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name = [unterminated").unwrap();

    let result: ma_common::Result<SampleConfig> = load_toml_or_default(Some(&path));
    assert!(result.is_err());
}
