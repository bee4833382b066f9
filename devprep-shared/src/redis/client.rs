//! Redis connection for the document store
//!
//! A thin wrapper over `redis::aio::ConnectionManager` (which reconnects on
//! its own) that also carries the key namespace every document key is
//! prefixed with.
//!
//! # Example
//!
//! ```no_run
//! use devprep_shared::redis::client::{RedisClient, RedisConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RedisClient::new(RedisConfig::from_env()?).await?;
//! assert!(client.ping().await?);
//! assert_eq!(client.key("topics"), "devprep:topics");
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default key prefix
pub const DEFAULT_NAMESPACE: &str = "devprep";

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `redis://[username:password@]host:port[/db]`
    pub url: String,

    /// Prefix for every key this service writes
    pub namespace: String,

    pub connection_timeout_secs: u64,

    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Loads from the environment
    ///
    /// - `REDIS_URL` (required)
    /// - `REDIS_NAMESPACE` (default `devprep`)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS` (default 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS` (default 10)
    pub fn from_env() -> Result<Self, RedisClientError> {
        let url = env::var("REDIS_URL").map_err(|_| {
            RedisClientError::ConfigError("REDIS_URL environment variable is required".to_string())
        })?;

        let namespace = env::var("REDIS_NAMESPACE")
            .ok()
            .map(|ns| ns.trim().trim_end_matches(':').to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let connection_timeout_secs = env::var("REDIS_CONNECTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let command_timeout_secs = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            url,
            namespace,
            connection_timeout_secs,
            command_timeout_secs,
        })
    }

    #[cfg(test)]
    pub fn default_for_test() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            namespace: "devprep-test".to_string(),
            connection_timeout_secs: 5,
            command_timeout_secs: 10,
        }
    }
}

/// Shared Redis handle; cheap to clone
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Opens the connection manager, failing if Redis is unreachable within
    /// the connection timeout
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("Timed out connecting to Redis".to_string()))?
        .map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(
            url = %sanitize_url(&config.url),
            namespace = %config.namespace,
            "Redis client connected"
        );

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// `PING` with the command timeout applied
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            self.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::HealthCheckFailed("PING command timed out".to_string()))?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(true),
            Ok(other) => {
                tracing::warn!("Redis health check: unexpected response: {}", other);
                Ok(false)
            }
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// A handle for issuing commands
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// `{namespace}:{suffix}`
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.config.namespace, suffix)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs)
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
