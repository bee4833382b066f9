//! Authentication endpoints
//!
//! # Endpoints
//!
//! - `POST /v1/auth/sign-up` - Create an account and get tokens
//! - `POST /v1/auth/sign-in` - Sign in and get tokens
//! - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
//! - `POST /v1/auth/reset-password` - Request a password reset
//! - `POST /v1/auth/sign-out` - Record sign-out (authenticated)
//! - `POST /v1/auth/github` - Link a GitHub identity (authenticated)
//!
//! Tokens are stateless JWTs; signing out records the time on the account
//! but does not revoke tokens already issued.

use crate::{app::AppState, error::ApiResult, middleware::auth::AuthContext};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use devprep_shared::{
    auth::jwt::{self, TokenPair, TokenType},
    models::{AuthUser, GithubIdentity},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Sign-up request
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength rules are checked by the store layer
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub display_name: Option<String>,
}

/// Sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub message: String,
}

/// GitHub identity to link
#[derive(Debug, Deserialize, Validate)]
pub struct LinkGithubRequest {
    #[validate(length(min = 1, max = 39, message = "GitHub username must be 1-39 characters"))]
    pub username: String,

    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,

    pub access_token: Option<String>,
}

/// A user as returned to clients
///
/// The GitHub OAuth token never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub github: Option<GithubProfile>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GithubProfile {
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<AuthUser> for UserResponse {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
            github: user.github.map(|github| GithubProfile {
                username: github.username,
                avatar_url: github.avatar_url,
            }),
            created_at: user.created_at,
        }
    }
}

/// User plus a fresh token pair
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

fn authenticated(state: &AppState, user: AuthUser) -> ApiResult<AuthResponse> {
    let tokens = jwt::issue_token_pair(user.id, &user.email, state.jwt_secret())?;
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}

/// Create an account
///
/// ```text
/// POST /v1/auth/sign-up
/// Content-Type: application/json
///
/// {
///   "email": "dev@example.com",
///   "password": "Str0ng!Passw0rd",
///   "display_name": "Dev"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `400 Bad Request`: Password too weak
/// - `409 Conflict`: Email already registered
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let display_name = req
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let user = state.db.sign_up(&req.email, &req.password, display_name).await?;
    tracing::info!(user_id = %user.id, "User signed up");

    Ok((StatusCode::CREATED, Json(authenticated(&state, user)?)))
}

/// Sign in with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = state.db.sign_in(&req.email, &req.password).await?;
    tracing::debug!(user_id = %user.id, "User signed in");

    Ok(Json(authenticated(&state, user)?))
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// Request a password reset
///
/// Always answers 202 for a well-formed address so the endpoint cannot be
/// used to discover accounts. The reset token is handed to delivery, never to
/// the caller or the logs.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<(StatusCode, Json<ResetPasswordResponse>)> {
    req.validate()?;

    let ticket = state.db.reset_password(&req.email).await?;
    tracing::info!(expires_at = %ticket.expires_at, "Password reset requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(ResetPasswordResponse {
            message: "If the address is registered, reset instructions have been sent".to_string(),
        }),
    ))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    state.db.sign_out(auth.user_id).await?;
    tracing::debug!(user_id = %auth.user_id, "User signed out");

    Ok(StatusCode::NO_CONTENT)
}

/// Link a GitHub identity to the signed-in account
pub async fn link_github(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<LinkGithubRequest>,
) -> ApiResult<Json<UserResponse>> {
    req.validate()?;

    let identity = GithubIdentity {
        username: req.username,
        avatar_url: req.avatar_url,
        access_token: req.access_token,
    };

    let user = state.db.link_github(auth.user_id, identity).await?;
    tracing::info!(user_id = %user.id, "GitHub identity linked");

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_drops_github_token() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
            email_verified: false,
            display_name: None,
            github: Some(GithubIdentity {
                username: "octodev".to_string(),
                avatar_url: None,
                access_token: Some("gho_secret".to_string()),
            }),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(json.contains("octodev"));
        assert!(!json.contains("gho_secret"));
    }

    #[test]
    fn test_sign_up_request_validation() {
        let req = SignUpRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            display_name: None,
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
