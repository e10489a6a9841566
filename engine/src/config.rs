//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::env;

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Identity of the local user, compared against lock owners
    pub local_user: String,
    /// Derive stable ids from natural keys instead of generating random ones
    pub deterministic_ids: bool,
    /// Field names left out of checksums
    pub checksum_exclude: Vec<String>,
    /// Request the lock when an entity is selected
    pub lock_on_select: bool,
    /// Oldest undo transactions are dropped beyond this depth
    pub max_undo_depth: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_user: "local".to_string(),
            deterministic_ids: false,
            checksum_exclude: Vec::new(),
            lock_on_select: true,
            max_undo_depth: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `TANDEM_*` environment variables. Unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let local_user = lookup("TANDEM_USER").unwrap_or(defaults.local_user);

        let deterministic_ids = match lookup("TANDEM_DETERMINISTIC_IDS") {
            Some(v) => parse_bool("TANDEM_DETERMINISTIC_IDS", &v)?,
            None => defaults.deterministic_ids,
        };

        let checksum_exclude = lookup("TANDEM_CHECKSUM_EXCLUDE")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.checksum_exclude);

        let lock_on_select = match lookup("TANDEM_LOCK_ON_SELECT") {
            Some(v) => parse_bool("TANDEM_LOCK_ON_SELECT", &v)?,
            None => defaults.lock_on_select,
        };

        let max_undo_depth = lookup("TANDEM_MAX_UNDO_DEPTH")
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber("TANDEM_MAX_UNDO_DEPTH"))
            })
            .transpose()?;

        Ok(Self {
            local_user,
            deterministic_ids,
            checksum_exclude,
            lock_on_select,
            max_undo_depth,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool(key)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid boolean value for {0}")]
    InvalidBool(&'static str),

    #[error("Invalid number for {0}")]
    InvalidNumber(&'static str),
}
