//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use devprep_api::{app::{build_router, AppState}, config::Config};
//! use devprep_shared::db::pool::{create_pool, DatabaseConfig};
//! use devprep_shared::redis::{RedisClient, RedisConfig};
//! use devprep_store::backends::{DocumentBackend, PostgresBackend, RedisDocumentStore};
//! use devprep_store::migration::MigrationRunner;
//! use devprep_store::DualDatabase;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = create_pool(DatabaseConfig::from_env()?).await?;
//! let redis = RedisClient::new(RedisConfig::from_env()?).await?;
//!
//! let postgres = Arc::new(PostgresBackend::new(pool.clone()));
//! let documents = Arc::new(RedisDocumentStore::new(redis.clone()));
//!
//! let db = DualDatabase::new(
//!     config.store.clone(),
//!     postgres.clone(),
//!     Arc::new(DocumentBackend::new(documents.clone())),
//! );
//! let migrator = MigrationRunner::new(postgres, documents, config.migration.clone());
//!
//! let state = AppState::new(db, migrator, config).with_connections(pool, redis);
//! let app = build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    middleware::{
        auth::{require_admin, require_user},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use devprep_shared::redis::RedisClient;
use devprep_store::{migration::MigrationRunner, DualDatabase};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Dual-store orchestrator
    pub db: Arc<DualDatabase>,

    /// Postgres to Redis content copier for the admin route
    pub migrator: Arc<MigrationRunner>,

    pub config: Arc<Config>,

    /// Raw connections probed by `/health`, when running against real stores
    pub pool: Option<PgPool>,
    pub redis: Option<RedisClient>,
}

impl AppState {
    pub fn new(db: DualDatabase, migrator: MigrationRunner, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            migrator: Arc::new(migrator),
            config: Arc::new(config),
            pool: None,
            redis: None,
        }
    }

    /// Attaches the live connections for health probes
    pub fn with_connections(mut self, pool: PgPool, redis: RedisClient) -> Self {
        self.pool = Some(pool);
        self.redis = Some(redis);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /sign-up
///     │   ├── POST /sign-in
///     │   ├── POST /refresh
///     │   ├── POST /reset-password
///     │   ├── POST /sign-out            (user)
///     │   └── POST /github              (user)
///     ├── GET /topics, /topics/:slug
///     ├── POST /topics/:slug/read       (user)
///     ├── GET /definitions, /definitions/:term
///     ├── GET /projects, /projects/:slug
///     ├── GET /quizzes, /quizzes/:slug
///     ├── POST /quizzes/:slug/results   (user)
///     ├── GET /me/results, /me/progress (user)
///     └── POST /admin/migrate           (admin token)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/sign-up", post(routes::auth::sign_up))
        .route("/sign-in", post(routes::auth::sign_in))
        .route("/refresh", post(routes::auth::refresh))
        .route("/reset-password", post(routes::auth::reset_password));

    let user_auth_routes = Router::new()
        .route("/sign-out", post(routes::auth::sign_out))
        .route("/github", post(routes::auth::link_github))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_user));

    let content_routes = Router::new()
        .route("/topics", get(routes::content::list_topics))
        .route("/topics/:slug", get(routes::content::get_topic))
        .route("/definitions", get(routes::content::list_definitions))
        .route("/definitions/:term", get(routes::content::get_definition))
        .route("/projects", get(routes::content::list_projects))
        .route("/projects/:slug", get(routes::content::get_project))
        .route("/quizzes", get(routes::content::list_quizzes))
        .route("/quizzes/:slug", get(routes::content::get_quiz));

    let progress_routes = Router::new()
        .route("/quizzes/:slug/results", post(routes::progress::submit_quiz_result))
        .route("/topics/:slug/read", post(routes::progress::mark_topic_read))
        .route("/me/results", get(routes::progress::my_results))
        .route("/me/progress", get(routes::progress::my_progress))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_user));

    let admin_routes = Router::new()
        .route("/migrate", post(routes::admin::migrate))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_admin));

    let v1_routes = Router::new()
        .nest("/auth", public_auth_routes.merge(user_auth_routes))
        .merge(content_routes)
        .merge(progress_routes)
        .nest("/admin", admin_routes);

    let cors = if state.config.allows_any_origin() {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
