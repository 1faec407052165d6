//! Agent configuration.
//!
//! # Responsibility
//! - Parse the agent option string handed over at attach time.
//! - Carry the strict-mode switch into the class tracker.
//!
//! # Invariants
//! - Unknown option keys are rejected, never ignored.
//! - `strict_mode` only affects the duplicate-class check.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Session-wide agent options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Enables internal assertions, such as rejecting a class recorded twice.
    pub strict_mode: bool,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl AgentConfig {
    /// Parses `key=value` pairs separated by commas, e.g. `assert=y,loglevel=debug`.
    ///
    /// Accepted keys: `assert`/`strict` (`y|n`), `loglevel`, `logdir`.
    /// An empty string yields the default configuration.
    pub fn parse_options(options: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for pair in options.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ConfigError::MissingValue(pair.to_string()));
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "assert" | "strict" => config.strict_mode = parse_flag(key, value)?,
                "loglevel" => config.log_level = Some(non_empty(key, value)?),
                "logdir" => config.log_dir = Some(non_empty(key, value)?),
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }
        Ok(config)
    }

    /// Configured level, or the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "y" => Ok(true),
        "n" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingValue(key.to_string()));
    }
    Ok(value.to_string())
}

/// Agent option parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownOption(String),
    MissingValue(String),
    InvalidValue { key: String, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOption(key) => write!(f, "unknown agent option: {key}"),
            Self::MissingValue(key) => write!(f, "agent option has no value: {key}"),
            Self::InvalidValue { key, value } => {
                write!(f, "agent option `{key}` expects y|n, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}
