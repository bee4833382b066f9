//! Learner activity endpoints (authenticated)
//!
//! - `POST /v1/quizzes/:slug/results` - Score and record a quiz attempt
//! - `POST /v1/topics/:slug/read` - Mark a topic as read
//! - `GET /v1/me/results` - Own quiz results, newest first
//! - `GET /v1/me/progress` - Own read markers

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::AuthContext,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use devprep_shared::models::{QuizResult, UserTopicProgress};
use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Answers keyed by question id, each the chosen option label
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: BTreeMap<Uuid, String>,
}

/// Scores the answers against the quiz and stores the result
///
/// ```text
/// POST /v1/quizzes/widget-basics/results
/// Authorization: Bearer eyJ...
///
/// { "answers": { "<question id>": "a" } }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: No quiz with that slug
/// - `400 Bad Request`: The quiz has no questions
pub async fn submit_quiz_result(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(req): Json<SubmitQuizRequest>,
) -> ApiResult<(StatusCode, Json<QuizResult>)> {
    let quiz = state
        .db
        .get_quiz_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("quiz not found: {}", slug)))?;

    let (score, total) = quiz.score(&req.answers);
    let result = state
        .db
        .save_quiz_result(auth.user_id, quiz.id, score, total)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        quiz = %slug,
        score,
        total,
        "Quiz result recorded"
    );

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn mark_topic_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> ApiResult<Json<UserTopicProgress>> {
    let topic = state
        .db
        .get_topic_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("topic not found: {}", slug)))?;

    let progress = state.db.mark_topic_read(auth.user_id, topic.id).await?;

    Ok(Json(progress))
}

pub async fn my_results(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<QuizResult>>> {
    Ok(Json(state.db.get_quiz_results(auth.user_id).await?))
}

pub async fn my_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserTopicProgress>>> {
    Ok(Json(state.db.get_topic_progress(auth.user_id).await?))
}
