//! Authenticated users
//!
//! The auth provider that is currently primary owns the account; the other
//! store keeps a best-effort mirror of the same profile. Password hashes are
//! part of the account inputs but never part of [`AuthUser`], so nothing
//! returned from the store layer carries credentials.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY,
//!     email TEXT NOT NULL UNIQUE,
//!     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
//!     password_hash TEXT NOT NULL,
//!     display_name TEXT,
//!     github_username TEXT,
//!     github_avatar_url TEXT,
//!     github_access_token TEXT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_sign_in_at TIMESTAMPTZ,
//!     signed_out_at TIMESTAMPTZ
//! );
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a password reset token stays valid
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 60;

/// A signed-up user as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,

    /// Lowercased, trimmed email address
    pub email: String,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Linked GitHub account, if any
    #[serde(default)]
    pub github: Option<GithubIdentity>,

    pub created_at: DateTime<Utc>,
}

/// GitHub identity linked to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubIdentity {
    pub username: String,

    #[serde(default)]
    pub avatar_url: Option<String>,

    /// OAuth token for GitHub API calls on the user's behalf
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Input for creating an account in a store
///
/// The id is minted once by the caller so that the primary store and its
/// mirror agree on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub id: Uuid,

    pub email: String,

    /// Argon2id hash (PHC string), never plaintext
    pub password_hash: String,

    pub display_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    pub fn new(email: &str, password_hash: String, display_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            display_name: display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            created_at: Utc::now(),
        }
    }

    /// The user record this account produces
    pub fn to_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: self.email.clone(),
            email_verified: false,
            display_name: self.display_name.clone(),
            github: None,
            created_at: self.created_at,
        }
    }
}

/// A pending password reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: Uuid,

    pub email: String,

    /// SHA-256 hex of the reset token
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn new(email: &str, token_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            token_hash,
            expires_at: now + Duration::minutes(PASSWORD_RESET_TTL_MINUTES),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Canonical form used for email lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_normalizes_input() {
        let account = NewAccount::new(
            "  Dev@Example.COM ",
            "$argon2id$hash".to_string(),
            Some("   ".to_string()),
        );

        assert_eq!(account.email, "dev@example.com");
        assert!(account.display_name.is_none());

        let user = account.to_user();
        assert_eq!(user.id, account.id);
        assert!(!user.email_verified);
        assert!(user.github.is_none());
    }

    #[test]
    fn test_password_reset_expiry() {
        let reset = PasswordReset::new("dev@example.com", "abc".to_string());
        assert!(!reset.is_expired());
        assert_eq!(
            (reset.expires_at - reset.created_at).num_minutes(),
            PASSWORD_RESET_TTL_MINUTES
        );
    }

    #[test]
    fn test_auth_user_omits_nothing_sensitive() {
        let user = NewAccount::new("dev@example.com", "secret-hash".to_string(), None).to_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
