//! # devprep API Server
//!
//! Serves devprep content and learner activity over HTTP, backed by the
//! Postgres and Redis stores through the dual-store orchestrator.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p devprep-api
//! ```

use anyhow::Context;
use devprep_api::{
    app::{build_router, AppState},
    config::Config,
};
use devprep_shared::db::migrations::run_migrations;
use devprep_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use devprep_shared::redis::{RedisClient, RedisConfig};
use devprep_store::backends::{DocumentBackend, PostgresBackend, RedisDocumentStore};
use devprep_store::migration::MigrationRunner;
use devprep_store::DualDatabase;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "devprep_api=debug,devprep_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("devprep API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig::from_env()?)
        .await
        .context("Failed to connect to Postgres")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply schema migrations")?;

    let redis = RedisClient::new(RedisConfig::from_env()?)
        .await
        .context("Failed to connect to Redis")?;

    let postgres = Arc::new(PostgresBackend::new(pool.clone()));
    let documents = Arc::new(RedisDocumentStore::new(redis.clone()));

    let db = DualDatabase::new(
        config.store.clone(),
        postgres.clone(),
        Arc::new(DocumentBackend::new(documents.clone())),
    );
    let migrator = MigrationRunner::new(postgres, documents, config.migration.clone());

    let bind_address = config.bind_address();
    let state = AppState::new(db, migrator, config).with_connections(pool.clone(), redis);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing connections...");
    close_pool(pool).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
