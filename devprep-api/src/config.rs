//! Configuration management for the API server
//!
//! Loaded from environment variables (and `.env` in development).
//!
//! # Environment Variables
//!
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8080)
//! - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
//! - `API_PRODUCTION`: Enables HSTS (default: false)
//! - `JWT_SECRET`: Secret key for JWT signing (required, 32+ characters)
//! - `ADMIN_TOKEN`: Bearer token for admin routes (admin routes are disabled when unset)
//! - `PRIMARY_DATABASE`, `DUAL_WRITE_ENABLED`, `CACHE_TTL_SECS`: see [`StoreConfig`]
//! - `MIGRATION_BATCH_SIZE`: see [`MigrationConfig`]
//!
//! # Example
//!
//! ```no_run
//! use devprep_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use devprep_shared::config::{parse_flag, MigrationConfig, StoreConfig};
use std::env;

/// Minimum accepted length for `JWT_SECRET`
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    pub jwt: JwtConfig,

    /// Admin bearer token, `None` disables admin routes
    pub admin_token: Option<String>,

    pub store: StoreConfig,

    pub migration: MigrationConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode turns on HSTS
    pub production: bool,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or too short
    /// - A variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let production = match env::var("API_PRODUCTION") {
            Ok(value) => parse_flag("API_PRODUCTION", &value)?,
            Err(_) => false,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        let admin_token = env::var("ADMIN_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        if admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN is not set, admin routes are disabled");
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            jwt: JwtConfig { secret: jwt_secret },
            admin_token,
            store: StoreConfig::from_env()?,
            migration: MigrationConfig::from_env()?,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
