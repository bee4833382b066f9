//! # devprep-migrate
//!
//! Copies content from Postgres (Backend A) into Redis (Backend B) and
//! prints the migration summary as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # everything
//! cargo run -p devprep-store --bin devprep-migrate
//!
//! # selected entity types
//! cargo run -p devprep-store --bin devprep-migrate -- topics quizzes
//! ```
//!
//! Exits with status 1 when the summary reports any error.

use anyhow::Context;
use devprep_shared::config::MigrationConfig;
use devprep_shared::db::migrations::run_migrations;
use devprep_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use devprep_shared::redis::{RedisClient, RedisConfig};
use devprep_store::backends::{PostgresBackend, RedisDocumentStore};
use devprep_store::migration::{EntityKind, MigrationRunner};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devprep_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("devprep-migrate v{} starting...", env!("CARGO_PKG_VERSION"));

    let kinds = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<EntityKind>().map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = create_pool(db_config)
        .await
        .context("Failed to connect to Postgres")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply schema migrations")?;

    let redis = RedisClient::new(RedisConfig::from_env()?)
        .await
        .context("Failed to connect to Redis")?;

    let runner = MigrationRunner::new(
        Arc::new(PostgresBackend::new(pool.clone())),
        Arc::new(RedisDocumentStore::new(redis)),
        MigrationConfig::from_env()?,
    );

    let summary = if kinds.is_empty() {
        runner.run().await
    } else {
        runner.run_selected(&kinds).await
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    close_pool(pool).await;

    if !summary.success {
        std::process::exit(1);
    }

    Ok(())
}
