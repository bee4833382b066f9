//! Content and activity records
//!
//! These are plain data records shared by both stores. Each store maps them
//! onto its own schema (tables for Postgres, JSON documents for Redis); the
//! orchestrator only ever hands these types to callers.
//!
//! # Models
//!
//! - `topic`: Lessons with a difficulty level and reading time
//! - `definition`: Glossary terms
//! - `project`: Sample projects with nested technologies and features
//! - `quiz`: Quizzes and their ordered questions
//! - `activity`: Quiz results and per-user topic progress
//! - `user`: Authenticated users and account inputs

pub mod activity;
pub mod definition;
pub mod project;
pub mod quiz;
pub mod topic;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use activity::{QuizResult, UserTopicProgress};
pub use definition::Definition;
pub use project::{normalize_nested, Feature, Project, Technology};
pub use quiz::{Quiz, QuizQuestion};
pub use topic::{Topic, TopicContent, TopicSection};
pub use user::{AuthUser, GithubIdentity, NewAccount, PasswordReset};

/// Experience level a piece of content targets
///
/// # Schema
///
/// ```sql
/// CREATE TYPE content_level AS ENUM ('junior', 'middle', 'senior');
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Junior,
    Middle,
    Senior,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Junior => "junior",
            Level::Middle => "middle",
            Level::Senior => "senior",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    /// Accepts the canonical names plus the beginner/intermediate/advanced
    /// vocabulary older project records use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" | "beginner" | "easy" => Ok(Level::Junior),
            "middle" | "intermediate" | "medium" => Ok(Level::Middle),
            "senior" | "advanced" | "hard" => Ok(Level::Senior),
            other => Err(format!("Unknown level: {}", other)),
        }
    }
}
