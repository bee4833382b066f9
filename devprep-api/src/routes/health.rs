//! Health check endpoint
//!
//! ```text
//! GET /health
//! ```
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "version": "0.1.0",
//!   "primary": "postgres",
//!   "secondary": "redis",
//!   "dual_write": true,
//!   "database": "connected",
//!   "redis": "connected",
//!   "store_events": { "fallbacks": 0, "mirror_failures": 0, "recent": [] }
//! }
//! ```
//!
//! `database` and `redis` read `not_configured` when the server runs without
//! live connections. Any `disconnected` probe makes the status `degraded`.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use devprep_shared::db::pool;
use devprep_store::events::StoreEventsSnapshot;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,

    pub version: String,

    pub primary: String,

    pub secondary: String,

    pub dual_write: bool,

    pub database: String,

    pub redis: String,

    /// Fallback and mirror failure counters
    pub store_events: StoreEventsSnapshot,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = match &state.pool {
        Some(db) => match pool::health_check(db).await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Postgres health check failed");
                "disconnected"
            }
        },
        None => "not_configured",
    };

    let redis = match &state.redis {
        Some(client) => match client.ping().await {
            Ok(true) => "connected",
            Ok(false) => "disconnected",
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                "disconnected"
            }
        },
        None => "not_configured",
    };

    let status = if database == "disconnected" || redis == "disconnected" {
        "degraded"
    } else {
        "healthy"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        primary: state.db.primary_name().to_string(),
        secondary: state.db.secondary_name().to_string(),
        dual_write: state.db.dual_write_enabled(),
        database: database.to_string(),
        redis: redis.to_string(),
        store_events: state.db.events().snapshot(),
    }))
}
