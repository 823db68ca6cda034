// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::io::Write;

#[test]
fn defaults_are_sane() {
    let config = WorkerConfig::default();
    assert_eq!(config.redis_url, "redis://127.0.0.1:6379/0");
    assert_eq!(config.poll_timeout(), Duration::from_secs(2));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(2));
    assert_eq!(config.heartbeat_ttl(), Duration::from_secs(5));
    // Liveness invariant: TTL strictly exceeds the refresh interval.
    assert!(config.heartbeat_ttl() > config.heartbeat_interval());
}

#[test]
fn load_from_parses_partial_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "redis_url = \"redis://queue-host:6379/1\"").unwrap();
    writeln!(file, "poll_timeout_secs = 7").unwrap();

    let config = WorkerConfig::load_from(file.path()).unwrap();
    assert_eq!(config.redis_url, "redis://queue-host:6379/1");
    assert_eq!(config.poll_timeout_secs, 7);
    // Unspecified fields fall back to defaults.
    assert_eq!(config.heartbeat_ttl_secs, 5);
}

#[test]
fn load_from_rejects_bad_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "poll_timeout_secs = \"soon\"").unwrap();

    assert!(matches!(
        WorkerConfig::load_from(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn load_from_missing_file_errors() {
    assert!(matches!(
        WorkerConfig::load_from(std::path::Path::new("/nonexistent/fm.toml")),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
#[serial]
fn env_url_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "redis_url = \"redis://from-file:6379/0\"").unwrap();

    std::env::set_var("FM_CONFIG", file.path());
    std::env::set_var("FM_REDIS_URL", "redis://from-env:6379/0");

    let config = WorkerConfig::load().unwrap();
    assert_eq!(config.redis_url, "redis://from-env:6379/0");

    std::env::remove_var("FM_CONFIG");
    std::env::remove_var("FM_REDIS_URL");
}

#[test]
#[serial]
fn missing_config_file_means_defaults() {
    std::env::set_var("FM_CONFIG", "/nonexistent/fm.toml");
    std::env::remove_var("FM_REDIS_URL");

    let config = WorkerConfig::load().unwrap();
    assert_eq!(config, WorkerConfig::default());

    std::env::remove_var("FM_CONFIG");
}

#[test]
fn config_roundtrips_through_toml() {
    let config = WorkerConfig {
        redis_url: "redis://elsewhere:6379/2".to_string(),
        poll_timeout_secs: 3,
        heartbeat_interval_secs: 4,
        heartbeat_ttl_secs: 9,
    };
    let text = toml::to_string(&config).unwrap();
    let back: WorkerConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, config);
}
