//! Authentication middleware
//!
//! [`require_user`] validates a JWT access token from the `Authorization`
//! header and injects an [`AuthContext`] into request extensions, where
//! handlers pick it up with `Extension<AuthContext>`. [`require_admin`]
//! checks the bearer token against `ADMIN_TOKEN`.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use devprep_shared::auth::jwt;
use uuid::Uuid;

/// The signed-in caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
}

/// Extracts the bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))
}

/// JWT authentication middleware layer
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(req).await)
}

/// Admin token middleware layer
///
/// Admin routes answer 403 when no `ADMIN_TOKEN` is configured.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::Forbidden("Admin routes are disabled".to_string()))?;

    let token = bearer_token(req.headers())?;
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::warn!("Rejected admin request with invalid token");
        return Err(ApiError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
