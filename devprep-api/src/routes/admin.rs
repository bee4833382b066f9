//! Admin endpoints (bearer `ADMIN_TOKEN`)
//!
//! ```text
//! POST /v1/admin/migrate
//! POST /v1/admin/migrate?entities=topics,quizzes
//! POST /v1/admin/migrate?entities=quiz_questions   (runs quizzes)
//! ```
//!
//! Runs the Postgres to Redis content migration and returns its summary.
//! The response status is 200 whenever the run completed, even with errors;
//! check `success` in the body.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Json,
};
use devprep_store::migration::{EntityKind, MigrationSummary};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct MigrateParams {
    /// Comma-separated entity types; all when absent
    pub entities: Option<String>,
}

fn parse_entities(value: &str) -> ApiResult<Vec<EntityKind>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .map(|kind| kind.parse::<EntityKind>().map_err(ApiError::BadRequest))
        .collect()
}

pub async fn migrate(
    State(state): State<AppState>,
    Query(params): Query<MigrateParams>,
) -> ApiResult<Json<MigrationSummary>> {
    let kinds = match params.entities.as_deref() {
        Some(value) => parse_entities(value)?,
        None => Vec::new(),
    };

    tracing::info!(entities = ?kinds, "Admin migration requested");

    let summary = if kinds.is_empty() {
        state.migrator.run().await
    } else {
        state.migrator.run_selected(&kinds).await
    };

    // Cached topics may predate the copy
    state.db.invalidate_content_cache();

    Ok(Json(summary))
}
