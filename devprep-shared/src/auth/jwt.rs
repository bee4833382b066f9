//! Session tokens
//!
//! Sessions are stateless HS256 JWTs. The API mints them after a successful
//! sign-up or sign-in, whichever store authenticated the user, so a session
//! survives a switch of primary store.
//!
//! - **Access token**: 24 hours, sent as `Authorization: Bearer ...`
//! - **Refresh token**: 30 days, exchanged for a new access token
//!
//! Sign-out does not revoke tokens; they stay valid until `exp`.
//!
//! # Example
//!
//! ```
//! use devprep_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let user_id = Uuid::new_v4();
//! let claims = Claims::new(user_id, "dev@example.com", TokenType::Access);
//! let token = create_token(&claims, "your-secret-key")?;
//!
//! let validated = validate_access_token(&token, "your-secret-key")?;
//! assert_eq!(validated.sub, user_id);
//! # Ok(())
//! # }
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "devprep";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token of the wrong type for this use
    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// Standard `sub`/`iss`/`iat`/`exp`/`nbf` plus the user's email and the
/// token type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    pub email: String,

    /// Always "devprep"
    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the default lifetime for `token_type`
    pub fn new(user_id: Uuid, email: &str, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, email, token_type, token_type.default_expiration())
    }

    pub fn with_expiration(
        user_id: Uuid,
        email: &str,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            email: email.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, zero if already expired
    pub fn expires_in_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, `nbf` and issuer, returning the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Expired means expired; no clock skew allowance
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
        });
    }
    Ok(claims)
}

/// Mints a new access token from a valid refresh token
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<String, JwtError> {
    let refresh_claims = validate_refresh_token(refresh_token, secret)?;
    let access_claims = Claims::new(refresh_claims.sub, &refresh_claims.email, TokenType::Access);
    create_token(&access_claims, secret)
}

/// Access and refresh token for a freshly authenticated user
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Issues an access/refresh pair for `user_id`
pub fn issue_token_pair(user_id: Uuid, email: &str, secret: &str) -> Result<TokenPair, JwtError> {
    let access = Claims::new(user_id, email, TokenType::Access);
    let refresh = Claims::new(user_id, email, TokenType::Refresh);

    Ok(TokenPair {
        access_token: create_token(&access, secret)?,
        refresh_token: create_token(&refresh, secret)?,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    })
}
