//! Per-user activity: quiz results and topic progress
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE quiz_results (
//!     id UUID PRIMARY KEY,
//!     user_id UUID NOT NULL,
//!     quiz_id UUID NOT NULL,
//!     score INTEGER NOT NULL,
//!     total_questions INTEGER NOT NULL,
//!     completed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE user_topic_progress (
//!     user_id UUID NOT NULL,
//!     topic_id UUID NOT NULL,
//!     read_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (user_id, topic_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed quiz attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizResult {
    pub id: Uuid,

    pub user_id: Uuid,

    pub quiz_id: Uuid,

    pub score: i32,

    pub total_questions: i32,

    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    /// Builds a new attempt record, validating the score bounds
    ///
    /// # Errors
    ///
    /// Returns a message if `total_questions` is not positive or `score` is
    /// outside `0..=total_questions`.
    pub fn new(user_id: Uuid, quiz_id: Uuid, score: i32, total_questions: i32) -> Result<Self, String> {
        if total_questions <= 0 {
            return Err("total_questions must be greater than 0".to_string());
        }

        if score < 0 || score > total_questions {
            return Err(format!(
                "score must be between 0 and {}",
                total_questions
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            quiz_id,
            score,
            total_questions,
            completed_at: Utc::now(),
        })
    }

    /// Score as a percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / f64::from(self.total_questions)
    }
}

/// Marks a topic as read by a user. One record per (user, topic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserTopicProgress {
    pub user_id: Uuid,

    pub topic_id: Uuid,

    pub read_at: DateTime<Utc>,
}

impl UserTopicProgress {
    pub fn new(user_id: Uuid, topic_id: Uuid) -> Self {
        Self {
            user_id,
            topic_id,
            read_at: Utc::now(),
        }
    }

    /// Stable document id for the (user, topic) pair
    pub fn document_id(&self) -> String {
        format!("{}:{}", self.user_id, self.topic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_result_bounds() {
        let user = Uuid::new_v4();
        let quiz = Uuid::new_v4();

        let result = QuizResult::new(user, quiz, 7, 10).unwrap();
        assert_eq!(result.percentage(), 70.0);

        assert!(QuizResult::new(user, quiz, 11, 10).is_err());
        assert!(QuizResult::new(user, quiz, -1, 10).is_err());
        assert!(QuizResult::new(user, quiz, 0, 0).is_err());
    }

    #[test]
    fn test_progress_document_id_is_stable() {
        let user = Uuid::new_v4();
        let topic = Uuid::new_v4();
        let first = UserTopicProgress::new(user, topic);
        let second = UserTopicProgress::new(user, topic);

        assert_eq!(first.document_id(), second.document_id());
        assert!(first.document_id().contains(':'));
    }
}
