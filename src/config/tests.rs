//! Tests for Configuration Module

use super::*;
use crate::logging::LogLevel;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = RecoveryConfig::default();

    assert_eq!(config.version, 1);
    assert_eq!(config.channel.name, "/recovery-gui-messages");
    assert_eq!(config.channel.capacity, 150);
    assert_eq!(config.update.chunk_size, 256);
    assert_eq!(config.export.media_path, PathBuf::from("/media/usb/sda"));
    assert_eq!(config.ui.tick_interval_ms, 5);
    assert_eq!(config.monitor.terminal_retry_ms, 50);
    assert_eq!(config.monitor.reconnect.max_attempts, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.json");

    assert!(matches!(RecoveryConfig::load(&path), Err(ConfigError::NotFound(_))));
    assert_eq!(RecoveryConfig::load_or_default(&path).unwrap(), RecoveryConfig::default());
}

#[test]
fn test_save_and_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.json");

    let mut config = RecoveryConfig::default();
    config.channel.capacity = 32;
    config.export.media_path = temp.path().join("usb");
    config.logging.level = LogLevel::Debug;
    config.save(&path).unwrap();

    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(RecoveryConfig::load(&path).unwrap(), config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "channel": { "capacity": 10 }, "monitor": { "reconnect": { "max_attempts": 5 } } }"#,
    )
    .unwrap();

    let config = RecoveryConfig::load(&path).unwrap();
    assert_eq!(config.channel.capacity, 10);
    assert_eq!(config.channel.name, "/recovery-gui-messages");
    assert_eq!(config.monitor.reconnect.max_attempts, Some(5));
    assert_eq!(config.monitor.reconnect.initial_delay_ms, 100);
    assert_eq!(config.update.chunk_size, 256);
}

#[test]
fn test_malformed_file_is_json_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(RecoveryConfig::load(&path), Err(ConfigError::Json(_))));
    assert!(matches!(RecoveryConfig::load_or_default(&path), Err(ConfigError::Json(_))));
}

#[test]
fn test_invalid_channel_name_rejected() {
    for name in ["queue", "/", "/a/b"] {
        let mut config = RecoveryConfig::default();
        config.channel.name = name.to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{}", name);
    }
}

#[test]
fn test_invalid_values_rejected() {
    let mut config = RecoveryConfig::default();
    config.channel.capacity = 0;
    assert!(config.validate().is_err());

    let mut config = RecoveryConfig::default();
    config.update.chunk_size = 0;
    assert!(config.validate().is_err());

    let mut config = RecoveryConfig::default();
    config.monitor.reconnect.multiplier = 0.5;
    assert!(config.validate().is_err());

    let mut config = RecoveryConfig::default();
    config.monitor.reconnect.initial_delay_ms = 10_000;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, r#"{ "update": { "chunk_size": 0 } }"#).unwrap();

    assert!(matches!(RecoveryConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_save_refuses_invalid_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    let mut config = RecoveryConfig::default();
    config.channel.capacity = 0;

    assert!(config.save(&path).is_err());
    assert!(!path.exists());
}
