// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! app_name = "copilot"
//! request_timeout_ms = 5000
//! log_level = "debug"
//!
//! [dispatch]
//! idle_max_us = 1000
//! ```

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Application name announced to the simulator.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Default request timeout (milliseconds, 0 = no timeout).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// First definition ID handed out for scalar fields.
    #[serde(default = "default_definition_id_base")]
    pub definition_id_base: u32,

    /// First definition ID handed out for compound types.
    #[serde(default = "default_struct_definition_id_base")]
    pub struct_definition_id_base: u32,

    /// Cache size at which a growth warning is logged (0 = never).
    #[serde(default = "default_definition_warn_threshold")]
    pub definition_warn_threshold: usize,

    /// Capacity of the connection event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dispatch loop tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Idle backoff of the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Empty polls retried immediately before sleeping.
    #[serde(default = "default_spin_polls")]
    pub spin_polls: u32,

    /// First idle sleep (microseconds).
    #[serde(default = "default_idle_min_us")]
    pub idle_min_us: u64,

    /// Idle sleep ceiling (microseconds).
    #[serde(default = "default_idle_max_us")]
    pub idle_max_us: u64,
}

fn default_app_name() -> String {
    "simlink".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_definition_id_base() -> u32 {
    10_000
}

fn default_struct_definition_id_base() -> u32 {
    1
}

fn default_definition_warn_threshold() -> usize {
    1024
}

fn default_event_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_spin_polls() -> u32 {
    8
}

fn default_idle_min_us() -> u64 {
    50
}

fn default_idle_max_us() -> u64 {
    2_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            request_timeout_ms: default_request_timeout_ms(),
            definition_id_base: default_definition_id_base(),
            struct_definition_id_base: default_struct_definition_id_base(),
            definition_warn_threshold: default_definition_warn_threshold(),
            event_capacity: default_event_capacity(),
            log_level: default_log_level(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            spin_polls: default_spin_polls(),
            idle_min_us: default_idle_min_us(),
            idle_max_us: default_idle_max_us(),
        }
    }
}

impl ConnectionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the default request timeout (`None` = wait forever).
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout.map_or(0, |t| t.as_millis().max(1) as u64);
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid("app_name must not be empty".into()));
        }

        if self.struct_definition_id_base >= self.definition_id_base {
            return Err(ConfigError::Invalid(format!(
                "struct_definition_id_base ({}) must be below definition_id_base ({})",
                self.struct_definition_id_base, self.definition_id_base
            )));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }

        self.log_level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::Invalid(format!("log_level: {}", e)))?;

        let dispatch = &self.dispatch;
        if dispatch.idle_min_us == 0 {
            return Err(ConfigError::Invalid("dispatch.idle_min_us must be at least 1".into()));
        }
        if dispatch.idle_max_us < dispatch.idle_min_us {
            return Err(ConfigError::Invalid(format!(
                "dispatch.idle_max_us ({}) must not be below dispatch.idle_min_us ({})",
                dispatch.idle_max_us, dispatch.idle_min_us
            )));
        }

        Ok(())
    }

    /// Default request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Parsed log level (falls back to info if unparsable).
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or(LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ConnectionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.definition_id_base, 10_000);
        assert_eq!(config.log_level(), LogLevel::Info);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            request_timeout_ms = 0
            log_level = "debug"

            [dispatch]
            idle_max_us = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.log_level(), LogLevel::Debug);
        assert_eq!(config.dispatch.idle_max_us, 500);
        assert_eq!(config.dispatch.spin_polls, 8);
        assert_eq!(config.app_name, "simlink");
    }

    #[test]
    fn overlapping_id_ranges_rejected() {
        let result = ConnectionConfig::from_toml_str(
            "definition_id_base = 10\nstruct_definition_id_base = 10\n",
        );
        match result {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("struct_definition_id_base")),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn bad_log_level_rejected() {
        let result = ConnectionConfig::from_toml_str("log_level = \"chatty\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_backoff_rejected() {
        let result =
            ConnectionConfig::from_toml_str("[dispatch]\nidle_min_us = 100\nidle_max_us = 10\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "app_name = \"copilot\"").unwrap();
        writeln!(file, "request_timeout_ms = 2500").unwrap();

        let config = ConnectionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.app_name, "copilot");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ConnectionConfig::from_file("/nonexistent/simlink.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn with_request_timeout() {
        let config = ConnectionConfig::default().with_request_timeout(None);
        assert_eq!(config.request_timeout(), None);
        let config = config.with_request_timeout(Some(Duration::from_millis(250)));
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
    }
}
