//! The logical store contract
//!
//! Both stores expose the same typed operations. The orchestrator never
//! knows which concrete store it is talking to; it only sees
//! `Arc<dyn Backend>`.
//!
//! Records handed to write operations are fully formed (ids, hashes and
//! timestamps already minted) so that a primary write and its mirror produce
//! the same record in both stores.
//!
//! # Example
//!
//! ```ignore
//! use devprep_store::backends::{Backend, StoreResult};
//!
//! async fn titles(backend: &dyn Backend) -> StoreResult<Vec<String>> {
//!     let topics = backend.get_topics().await?;
//!     Ok(topics.into_iter().map(|t| t.title).collect())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devprep_shared::auth::password::PasswordError;
use devprep_shared::models::{
    AuthUser, Definition, GithubIdentity, NewAccount, PasswordReset, Project, Quiz, QuizResult,
    Topic, UserTopicProgress,
};
use uuid::Uuid;

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached or refused service
    #[error("{backend} unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored document does not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Unique key already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Input rejected before reaching storage
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl StoreError {
    /// Whether the error is a definitive answer rather than a failure to
    /// answer. Fallback reads return these as-is instead of asking the other
    /// store.
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidCredentials | StoreError::Conflict(_) | StoreError::InvalidRecord(_)
        )
    }

    /// The store answered but has no such record
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Logical operations every store implements
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short store name used in logs and events
    fn name(&self) -> &'static str;

    // Auth

    /// Creates an account; `Conflict` if the email is taken
    async fn sign_up(&self, account: &NewAccount) -> StoreResult<AuthUser>;

    /// Verifies the password hash. `NotFound` when the email is unknown to
    /// this store, `InvalidCredentials` on a wrong password.
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<AuthUser>;

    async fn sign_out(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Stores a reset request. Unknown emails succeed without storing
    /// anything.
    async fn reset_password(&self, reset: &PasswordReset) -> StoreResult<()>;

    async fn link_github(&self, user_id: Uuid, identity: &GithubIdentity) -> StoreResult<AuthUser>;

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<AuthUser>>;

    // Content

    async fn get_topics(&self) -> StoreResult<Vec<Topic>>;

    async fn get_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>>;

    async fn get_definitions(&self) -> StoreResult<Vec<Definition>>;

    async fn get_definition(&self, term: &str) -> StoreResult<Option<Definition>>;

    async fn get_projects(&self) -> StoreResult<Vec<Project>>;

    async fn get_project_by_slug(&self, slug: &str) -> StoreResult<Option<Project>>;

    /// Quizzes without their questions
    async fn get_quizzes(&self) -> StoreResult<Vec<Quiz>>;

    /// Quiz with questions ordered by position
    async fn get_quiz_by_slug(&self, slug: &str) -> StoreResult<Option<Quiz>>;

    // Activity

    async fn save_quiz_result(&self, result: &QuizResult) -> StoreResult<()>;

    /// Newest first
    async fn get_quiz_results(&self, user_id: Uuid) -> StoreResult<Vec<QuizResult>>;

    /// Upserts one record per (user, topic)
    async fn mark_topic_read(&self, progress: &UserTopicProgress) -> StoreResult<()>;

    async fn get_topic_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserTopicProgress>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authoritative_errors() {
        assert!(StoreError::InvalidCredentials.is_authoritative());
        assert!(StoreError::Conflict("email taken".into()).is_authoritative());
        assert!(StoreError::InvalidRecord("bad score".into()).is_authoritative());

        assert!(!StoreError::Unavailable {
            backend: "postgres",
            message: "connection refused".into()
        }
        .is_authoritative());
        assert!(!StoreError::not_found("user", Uuid::nil()).is_authoritative());
        assert!(StoreError::not_found("account", "dev@example.com").is_not_found());
        assert!(!StoreError::InvalidCredentials.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::Unavailable {
            backend: "redis",
            message: "network error".into(),
        };
        assert_eq!(err.to_string(), "redis unavailable: network error");

        let err = StoreError::not_found("topic", "flutter-basics");
        assert_eq!(err.to_string(), "topic not found: flutter-basics");
    }
}
