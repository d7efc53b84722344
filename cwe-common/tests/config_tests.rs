//! Integration tests for configuration file resolution
//!
//! Tests that manipulate CWE_HARVEST_CONFIG are marked with #[serial]
//! so they never race each other.

use cwe_common::config::{
    load_config, load_toml_config, resolve_config_path, CONFIG_ENV_VAR, DEFAULT_FALLBACK_URL,
};
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_argument_overrides_env() {
    std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
    assert_eq!(resolved.as_deref(), Some(Path::new("/from/cli.toml")));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_used_when_no_cli_argument() {
    std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved.as_deref(), Some(Path::new("/from/env.toml")));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_an_error() {
    std::env::remove_var(CONFIG_ENV_VAR);

    let result = load_config(Some(Path::new("/definitely/not/here.toml")));
    assert!(result.is_err());
}

#[test]
fn test_full_file_round_trips_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [api]
        base_url = "http://127.0.0.1:9000/api/v1"
        view = "1000"
        insecure = true

        [collector]
        max_workers = 4
        batch_size = 10
        cache_capacity = 50
        max_retries = 1

        [logging]
        level = "debug"
        "#,
    );

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.api.base_url, "http://127.0.0.1:9000/api/v1");
    assert_eq!(config.api.view, "1000");
    assert!(config.api.insecure);
    assert_eq!(config.api.fallback_url, DEFAULT_FALLBACK_URL);
    assert_eq!(config.collector.max_workers, Some(4));
    assert_eq!(config.collector.batch_size, 10);
    assert_eq!(config.collector.cache_capacity, 50);
    assert_eq!(config.collector.max_retries, 1);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_file_reports_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[api\nbase_url = ");

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
