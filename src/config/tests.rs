//! Tests for config functionality.

use crate::config::Config;
use crate::fs::LockWait;
use crate::store::WriteMode;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.locks_file, "locks.json");
    assert_eq!(config.messages_file, "messages.json");
    assert_eq!(config.audit_file, "audit.ndjson");
    assert_eq!(config.lock_stale_minutes, 120);
    assert_eq!(config.lock_timeout_ms, None);
    assert_eq!(config.write_mode, WriteMode::InPlace);
    config.validate().unwrap();
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
lock_stale_minutes: 30
write_mode: replace
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.lock_stale_minutes, 30);
    assert_eq!(config.write_mode, WriteMode::Replace);
    assert_eq!(config.locks_file, "locks.json");
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
locks_file: checkouts.json
messages_file: inbox.json
audit_file: audit.log
lock_stale_minutes: 45
lock_timeout_ms: 1500
write_mode: in_place
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.locks_file, "checkouts.json");
    assert_eq!(config.messages_file, "inbox.json");
    assert_eq!(config.audit_file, "audit.log");
    assert_eq!(config.lock_stale_minutes, 45);
    assert_eq!(config.lock_timeout_ms, Some(1500));
    assert_eq!(config.write_mode, WriteMode::InPlace);
}

#[test]
fn test_parse_yaml_with_unknown_fields() {
    let yaml = r#"
lock_stale_minutes: 60
gitlab_url: https://gitlab.example.com
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_stale_minutes, 60);
}

#[test]
fn test_parse_invalid_write_mode() {
    let result = Config::from_yaml("write_mode: sideways");
    assert!(result.is_err());
}

#[test]
fn test_validate_zero_lock_stale_minutes() {
    let result = Config::from_yaml("lock_stale_minutes: 0");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("lock_stale_minutes"));
}

#[test]
fn test_validate_file_names_must_be_plain() {
    let err = Config::from_yaml("locks_file: ../locks.json").unwrap_err();
    assert!(err.to_string().contains("locks_file"));

    let err = Config::from_yaml("audit_file: \"\"").unwrap_err();
    assert!(err.to_string().contains("audit_file"));
}

#[test]
fn test_validate_file_names_must_differ() {
    let err = Config::from_yaml("messages_file: locks.json").unwrap_err();
    assert!(err.to_string().contains("must differ"));
}

#[test]
fn test_store_options() {
    let config = Config::from_yaml("lock_timeout_ms: 250\nwrite_mode: replace").unwrap();
    let options = config.store_options();

    assert_eq!(options.wait, LockWait::Timeout(Duration::from_millis(250)));
    assert_eq!(options.write_mode, WriteMode::Replace);
    assert_eq!(Config::default().lock_wait(), LockWait::Blocking);
}

#[test]
fn test_to_yaml_round_trip() {
    let mut config = Config::default();
    config.lock_timeout_ms = Some(10);
    config.write_mode = WriteMode::Replace;

    let yaml = config.to_yaml().unwrap();
    assert!(yaml.contains("write_mode: replace"));
    assert_eq!(Config::from_yaml(&yaml).unwrap(), config);
}

#[test]
fn test_config_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "lock_stale_minutes: 15\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.lock_stale_minutes, 15);
}

#[test]
fn test_config_load_missing_file() {
    let result = Config::load("/nonexistent/path/config.yaml");
    assert!(result.is_err());
}

#[test]
fn test_config_load_or_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");

    assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());

    std::fs::write(&path, "lock_stale_minutes: [not a number]").unwrap();
    assert!(Config::load_or_default(&path).is_err());
}
