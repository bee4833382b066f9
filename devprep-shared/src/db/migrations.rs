//! Schema migrations for the relational store
//!
//! SQL files live in `devprep-shared/migrations/` and are embedded at compile
//! time with `sqlx::migrate!`. These are schema migrations; the content copy
//! between stores lives in `devprep-store`.

use sqlx::postgres::PgPool;
use tracing::{debug, info, warn};

/// Applied-migration summary from `_sqlx_migrations`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,

    pub latest_version: Option<i64>,

    /// True when every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Runs all pending schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Reports which schema migrations have been applied
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: false,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let embedded_latest = sqlx::migrate!("./migrations")
        .iter()
        .map(|m| m.version)
        .max();

    Ok(MigrationStatus {
        applied_migrations: count as usize,
        latest_version,
        is_up_to_date: latest_version.is_some() && latest_version >= embedded_latest,
    })
}
