//! Integration tests for configuration loading and environment overrides
//!
//! Tests that manipulate ROLLCALL_* variables are marked with #[serial]
//! so they never run in parallel with each other.

use rollcall_common::config::TomlConfig;
use rollcall_common::Error;
use serial_test::serial;
use std::env;
use tempfile::TempDir;

fn clear_env() {
    for key in [
        "ROLLCALL_BIND_ADDR",
        "ROLLCALL_DATABASE_PATH",
        "ROLLCALL_LOG_LEVEL",
        "ROLLCALL_RECOGNITION_URL",
        "ROLLCALL_RECOGNITION_API_KEY",
        "ROLLCALL_RECOGNITION_TIMEOUT_MS",
        "ROLLCALL_NOTIFICATION_WEBHOOK_URL",
    ] {
        env::remove_var(key);
    }
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load(&path).expect("Missing config must not be fatal");
    assert_eq!(config.bind_addr, rollcall_common::config::DEFAULT_BIND_ADDR);
    assert_eq!(config.recognition.url, rollcall_common::config::DEFAULT_RECOGNITION_URL);
}

#[test]
fn test_load_full_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rollcall.toml");
    std::fs::write(
        &path,
        r#"
bind_addr = "0.0.0.0:9000"
database_path = "/var/lib/rollcall/test.db"

[logging]
level = "debug"

[recognition]
url = "http://faces.internal:8002"
api_key = "secret"
timeout_ms = 45000

[notification]
webhook_url = "http://n8n.internal/webhook/attendance"
timeout_ms = 5000

[processing]
max_concurrent_jobs = 2
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.bind_addr, "0.0.0.0:9000");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.recognition.api_key.as_deref(), Some("secret"));
    assert_eq!(config.recognition.timeout_ms, 45_000);
    assert_eq!(
        config.notification.webhook_url.as_deref(),
        Some("http://n8n.internal/webhook/attendance")
    );
    assert_eq!(config.processing.max_concurrent_jobs, 2);
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rollcall.toml");
    std::fs::write(&path, "bind_addr = [this is not toml").unwrap();

    let result = TomlConfig::load(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_overrides_take_priority_over_file() {
    clear_env();
    env::set_var("ROLLCALL_RECOGNITION_URL", "http://override:8000");
    env::set_var("ROLLCALL_RECOGNITION_TIMEOUT_MS", "1500");
    env::set_var("ROLLCALL_NOTIFICATION_WEBHOOK_URL", "http://hook");

    let mut config = TomlConfig::default();
    config.apply_env_overrides();

    assert_eq!(config.recognition.url, "http://override:8000");
    assert_eq!(config.recognition.timeout_ms, 1500);
    assert_eq!(config.notification.webhook_url.as_deref(), Some("http://hook"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_number_is_ignored() {
    clear_env();
    env::set_var("ROLLCALL_RECOGNITION_TIMEOUT_MS", "soon");

    let mut config = TomlConfig::default();
    config.apply_env_overrides();

    assert_eq!(config.recognition.timeout_ms, 30_000);

    clear_env();
}
