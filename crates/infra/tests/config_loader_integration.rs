//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! environment overrides.

use std::io::Write;
use std::path::PathBuf;

use tempfile::{Builder, NamedTempFile};
use tokenwarden_domain::{Platform, StoreKind};
use tokenwarden_infra::config::{self, LoaderError};

fn temp_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_load_config_from_toml_file() {
    let file = temp_config(
        ".toml",
        r#"
[platforms.reddit]
client_id = "reddit-id"
client_secret = "reddit-secret"
scopes = ["identity", "read"]

[monitor]
check_interval_secs = 120
max_concurrent_refreshes = 5

[circuit_breaker]
failure_threshold = 3

[store]
kind = "file"
path = "/tmp/tokenwarden/tokens.json"
"#,
    );

    let settings = config::load_with(Some(file.path().to_path_buf()), no_env).unwrap();

    assert_eq!(settings.platforms[&Platform::Reddit].client_id, "reddit-id");
    assert_eq!(settings.monitor.check_interval_secs, 120);
    assert_eq!(settings.monitor.max_concurrent_refreshes, 5);
    assert_eq!(settings.circuit_breaker.failure_threshold, 3);
    // Unset values keep their defaults
    assert_eq!(settings.circuit_breaker.recovery_timeout_secs, 60);
    assert_eq!(settings.store.kind, StoreKind::File);
}

#[test]
fn test_load_config_from_json_file() {
    let file = temp_config(
        ".json",
        r#"{
            "platforms": {"tiktok": {"client_id": "ck", "client_secret": "cs"}},
            "logging": {"level": "debug", "json": true}
        }"#,
    );

    let settings = config::load_with(Some(file.path().to_path_buf()), no_env).unwrap();

    assert!(settings.platforms.contains_key(&Platform::TikTok));
    assert_eq!(settings.logging.level, "debug");
    assert!(settings.logging.json);
}

/// Validates layering of the environment over the file.
///
/// Assertions:
/// - Environment values win over file values.
/// - File values without an override are kept.
#[test]
fn test_environment_overrides_file() {
    let file = temp_config(
        ".toml",
        r#"
[platforms.youtube]
client_id = "file-id"
client_secret = "file-secret"

[monitor]
check_interval_secs = 120
"#,
    );

    let env = |key: &str| match key {
        "TOKENWARDEN_CHECK_INTERVAL_SECS" => Some("30".to_string()),
        "TOKENWARDEN_YOUTUBE_CLIENT_SECRET" => Some("env-secret".to_string()),
        _ => None,
    };
    let settings = config::load_with(Some(file.path().to_path_buf()), env).unwrap();

    assert_eq!(settings.monitor.check_interval_secs, 30);
    let youtube = &settings.platforms[&Platform::YouTube];
    assert_eq!(youtube.client_id, "file-id");
    assert_eq!(youtube.client_secret, "env-secret");
}

#[test]
fn test_no_file_yields_defaults() {
    let settings = config::load_with(None, no_env).unwrap();
    assert!(settings.platforms.is_empty());
    assert!(settings.monitor.enabled);
    assert_eq!(settings.store.kind, StoreKind::Memory);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let err = config::load_with(Some(PathBuf::from("/nonexistent/tokenwarden.toml")), no_env)
        .unwrap_err();
    assert!(matches!(err, LoaderError::NotFound { .. }));
}

#[test]
fn test_invalid_settings_fail_validation() {
    let file = temp_config(".toml", "[monitor]\ncheck_interval_secs = 0\n");
    let err = config::load_with(Some(file.path().to_path_buf()), no_env).unwrap_err();
    assert!(matches!(err, LoaderError::Invalid(_)));
    assert!(err.to_string().contains("check_interval_secs"));
}

#[test]
fn test_malformed_toml_reports_path() {
    let file = temp_config(".toml", "[monitor\n");
    let err = config::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, LoaderError::Parse { format: "TOML", .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}
