//! Integration tests for configuration layering.
//!
//! These mutate process environment variables and run serially.

use courier_core::{config::AppConfig, EngineBuilder};
use serial_test::serial;
use std::path::PathBuf;

fn write_temp_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("courier-{name}-{}.toml", std::process::id()));
    std::fs::write(&path, contents).expect("Failed to write temp config");
    path
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let path = write_temp_config(
        "file",
        r#"
[throttle]
min_interval_ms = 250

[throttle.host_intervals]
localhost = 4000

[cache]
renewal_window_ms = 60000
"#,
    );

    let config = AppConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.throttle.min_interval_ms, 250);
    assert_eq!(config.throttle.host_intervals.get("localhost"), Some(&4000));
    assert_eq!(config.cache.renewal_window_ms, 60_000);
    assert_eq!(config.retry.max_retries, 2);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let path = write_temp_config("env", "[retry]\nmax_retries = 4\n");

    std::env::set_var("COURIER__RETRY__MAX_RETRIES", "7");
    std::env::set_var("COURIER__FALLBACK__ENABLED", "false");
    let config = AppConfig::from_file(&path);
    std::env::remove_var("COURIER__RETRY__MAX_RETRIES");
    std::env::remove_var("COURIER__FALLBACK__ENABLED");
    std::fs::remove_file(&path).unwrap();

    let config = config.unwrap();
    assert_eq!(config.retry.max_retries, 7);
    assert!(!config.fallback.enabled);
}

#[test]
#[serial]
fn test_load_honors_config_path_variable() {
    let path = write_temp_config("load", "[logging]\nformat = \"json\"\n");

    std::env::set_var("COURIER_CONFIG", &path);
    let config = AppConfig::load();
    std::env::remove_var("COURIER_CONFIG");
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.unwrap().logging.format, "json");
}

#[test]
#[serial]
fn test_invalid_config_is_rejected_by_builder() {
    let path =
        write_temp_config("invalid", "[retry]\nbackoff_min_ms = 900\nbackoff_max_ms = 100\n");

    let config = AppConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(config.validate().is_err());
    assert!(EngineBuilder::from_config(&config).build().is_err());
}
