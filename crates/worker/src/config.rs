// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker daemon configuration.
//!
//! Loaded from a TOML file (default `~/.config/foreman/config.toml`,
//! overridable with `FM_CONFIG`), with `FM_REDIS_URL` taking precedence
//! over the file. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    2
}

fn default_heartbeat_interval_secs() -> u64 {
    2
}

fn default_heartbeat_ttl_secs() -> u64 {
    5
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings for one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Blocking fetch timeout. Bounds how long shutdown waits on an idle
    /// worker.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Must exceed the heartbeat interval or live workers look dead.
    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
        }
    }
}

impl WorkerConfig {
    /// Load from the default location (or `FM_CONFIG`), then apply env
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var("FM_REDIS_URL") {
            if !url.is_empty() {
                config.redis_url = url;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FM_CONFIG") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("foreman").join("config.toml"))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
