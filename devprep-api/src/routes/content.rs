//! Read-only content endpoints
//!
//! Reads go to the primary store and fall back to the secondary one; topics
//! are served from the expiring cache when warm.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use devprep_shared::models::{Definition, Project, Quiz, Topic};

fn found<T>(value: Option<T>, entity: &str, key: &str) -> ApiResult<Json<T>> {
    value
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} not found: {}", entity, key)))
}

pub async fn list_topics(State(state): State<AppState>) -> ApiResult<Json<Vec<Topic>>> {
    Ok(Json(state.db.get_topics().await?))
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Topic>> {
    found(state.db.get_topic_by_slug(&slug).await?, "topic", &slug)
}

pub async fn list_definitions(State(state): State<AppState>) -> ApiResult<Json<Vec<Definition>>> {
    Ok(Json(state.db.get_definitions().await?))
}

pub async fn get_definition(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> ApiResult<Json<Definition>> {
    found(state.db.get_definition(&term).await?, "definition", &term)
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.db.get_projects().await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Project>> {
    found(state.db.get_project_by_slug(&slug).await?, "project", &slug)
}

/// Quizzes without their questions
pub async fn list_quizzes(State(state): State<AppState>) -> ApiResult<Json<Vec<Quiz>>> {
    Ok(Json(state.db.get_quizzes().await?))
}

/// One quiz with its questions in position order
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Quiz>> {
    found(state.db.get_quiz_by_slug(&slug).await?, "quiz", &slug)
}
