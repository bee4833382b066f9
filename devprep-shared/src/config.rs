//! Store selection and migration configuration
//!
//! The dual-store orchestrator is configured once at startup from these
//! structs; nothing below re-reads the environment per call.
//!
//! # Environment Variables
//!
//! - `PRIMARY_DATABASE`: `postgres` (alias `supabase`) or `redis` (alias `firebase`). Default: postgres
//! - `DUAL_WRITE_ENABLED`: boolean-like flag (`true/false`, `1/0`, `yes/no`, `on/off`). Default: true
//! - `CACHE_TTL_SECS`: expiring cache lifetime in seconds. Default: 3600
//! - `MIGRATION_BATCH_SIZE`: writes per committed batch, 1..=500. Default: 500

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest number of writes a single batch commit may carry.
pub const MAX_BATCH_WRITES: usize = 500;

/// Default lifetime of an expiring cache entry (one hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Unknown backend name
    #[error("Unknown backend '{0}', expected postgres or redis")]
    UnknownBackend(String),

    /// Value is not boolean-like
    #[error("Invalid boolean value for {key}: '{value}'")]
    InvalidFlag { key: String, value: String },

    /// Value is not a number
    #[error("Invalid numeric value for {key}: '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// The two concrete stores the application can run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational store (Backend A)
    Postgres,

    /// Document store (Backend B)
    Redis,
}

impl BackendKind {
    /// The store that is not `self`
    pub fn other(&self) -> Self {
        match self {
            BackendKind::Postgres => BackendKind::Redis,
            BackendKind::Redis => BackendKind::Postgres,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Redis => "redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "supabase" => Ok(BackendKind::Postgres),
            "redis" | "firebase" => Ok(BackendKind::Redis),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Dual-store orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store whose results are authoritative
    pub primary: BackendKind,

    /// Whether successful primary writes are mirrored to the secondary store
    pub dual_write: bool,

    /// Lifetime of cached topic reads, in seconds
    pub cache_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary: BackendKind::Postgres,
            dual_write: true,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl StoreConfig {
    /// Loads store settings from the environment, falling back to defaults
    /// for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let primary = match env::var("PRIMARY_DATABASE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.primary,
        };

        let dual_write = match env::var("DUAL_WRITE_ENABLED") {
            Ok(value) => parse_flag("DUAL_WRITE_ENABLED", &value)?,
            Err(_) => defaults.dual_write,
        };

        let cache_ttl_secs = match env::var("CACHE_TTL_SECS") {
            Ok(value) => parse_number("CACHE_TTL_SECS", &value)?,
            Err(_) => defaults.cache_ttl_secs,
        };

        Ok(Self {
            primary,
            dual_write,
            cache_ttl_secs,
        })
    }

    /// The store that mirrors writes and serves fallback reads
    pub fn secondary(&self) -> BackendKind {
        self.primary.other()
    }
}

/// Migration runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Writes per committed batch (clamped to 1..=500)
    pub batch_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_WRITES,
        }
    }
}

impl MigrationConfig {
    /// Creates a config with the batch size clamped to the store limit
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_WRITES),
        }
    }

    /// Loads `MIGRATION_BATCH_SIZE` from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        match env::var("MIGRATION_BATCH_SIZE") {
            Ok(value) => Ok(Self::with_batch_size(parse_number(
                "MIGRATION_BATCH_SIZE",
                &value,
            )?)),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Parses a boolean-like environment value
pub fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}
