//! # devprep store library
//!
//! Persistence for the devprep backend: two stores kept side by side, an
//! orchestrator that decides which one answers, and a migration runner that
//! copies content between them.
//!
//! ## Modules
//!
//! - `backends`: Store trait and the Postgres, Redis and in-memory stores
//! - `orchestrator`: Dual-write and fallback-read strategies, `DualDatabase`
//! - `migration`: Batched, de-duplicating content copy
//! - `events`: Divergence and fallback tracking
//!
//! ## Example
//!
//! ```no_run
//! use devprep_shared::config::StoreConfig;
//! use devprep_shared::redis::{RedisClient, RedisConfig};
//! use devprep_store::backends::{DocumentBackend, PostgresBackend, RedisDocumentStore};
//! use devprep_store::orchestrator::DualDatabase;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let redis = RedisClient::new(RedisConfig::from_env()?).await?;
//! let db = DualDatabase::new(
//!     StoreConfig::from_env()?,
//!     Arc::new(PostgresBackend::new(pool)),
//!     Arc::new(DocumentBackend::new(Arc::new(RedisDocumentStore::new(redis)))),
//! );
//! let topics = db.get_topics().await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod events;
pub mod migration;
pub mod orchestrator;

pub use orchestrator::{DualDatabase, PasswordResetTicket};
