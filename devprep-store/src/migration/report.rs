//! Migration results

use crate::backends::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity types the runner copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Topics,
    Definitions,
    Projects,
    Quizzes,
    QuizQuestions,
}

impl EntityKind {
    /// Kinds the runner walks, in run order. Questions are not walked on
    /// their own; they move with their quiz, so requesting them runs quizzes.
    pub const SELECTABLE: [EntityKind; 4] = [
        EntityKind::Topics,
        EntityKind::Definitions,
        EntityKind::Projects,
        EntityKind::Quizzes,
    ];

    pub fn collection(&self) -> Collection {
        match self {
            EntityKind::Topics => Collection::Topics,
            EntityKind::Definitions => Collection::Definitions,
            EntityKind::Projects => Collection::Projects,
            EntityKind::Quizzes => Collection::Quizzes,
            EntityKind::QuizQuestions => Collection::QuizQuestions,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection().name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "topics" | "topic" => Ok(EntityKind::Topics),
            "definitions" | "definition" => Ok(EntityKind::Definitions),
            "projects" | "project" => Ok(EntityKind::Projects),
            "quizzes" | "quiz" => Ok(EntityKind::Quizzes),
            "quiz_questions" | "quiz_question" | "questions" => Ok(EntityKind::QuizQuestions),
            other => Err(format!("Unknown entity type: {}", other)),
        }
    }
}

/// Per-entity counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    /// Source records looked at
    pub attempted: usize,

    /// Records written to the target
    pub migrated: usize,

    /// Records already present in the target
    pub skipped: usize,

    pub errors: Vec<String>,
}

impl EntityReport {
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Reports for every entity plus errors not tied to a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDetails {
    pub topics: EntityReport,
    pub definitions: EntityReport,
    pub projects: EntityReport,
    pub quizzes: EntityReport,
    pub quiz_questions: EntityReport,

    /// Entity-level failures, such as a source listing that failed
    pub errors: Vec<String>,
}

impl MigrationDetails {
    pub fn report(&self, kind: EntityKind) -> &EntityReport {
        match kind {
            EntityKind::Topics => &self.topics,
            EntityKind::Definitions => &self.definitions,
            EntityKind::Projects => &self.projects,
            EntityKind::Quizzes => &self.quizzes,
            EntityKind::QuizQuestions => &self.quiz_questions,
        }
    }

    pub fn report_mut(&mut self, kind: EntityKind) -> &mut EntityReport {
        match kind {
            EntityKind::Topics => &mut self.topics,
            EntityKind::Definitions => &mut self.definitions,
            EntityKind::Projects => &mut self.projects,
            EntityKind::Quizzes => &mut self.quizzes,
            EntityKind::QuizQuestions => &mut self.quiz_questions,
        }
    }

    /// Record and entity-level errors combined
    pub fn total_errors(&self) -> usize {
        self.errors.len()
            + [
                &self.topics,
                &self.definitions,
                &self.projects,
                &self.quizzes,
                &self.quiz_questions,
            ]
            .iter()
            .map(|report| report.errors.len())
            .sum::<usize>()
    }

    pub fn total_migrated(&self) -> usize {
        self.topics.migrated
            + self.definitions.migrated
            + self.projects.migrated
            + self.quizzes.migrated
            + self.quiz_questions.migrated
    }
}

/// Outcome of one migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// True when no errors were recorded anywhere
    pub success: bool,

    pub message: String,

    pub details: MigrationDetails,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl MigrationSummary {
    pub fn from_details(
        details: MigrationDetails,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let errors = details.total_errors();
        let success = errors == 0;

        let message = if success {
            format!(
                "Migration completed: {} records migrated",
                details.total_migrated()
            )
        } else {
            format!(
                "Migration finished with {} errors ({} records migrated)",
                errors,
                details.total_migrated()
            )
        };

        Self {
            success,
            message,
            details,
            started_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!("Topics".parse::<EntityKind>().unwrap(), EntityKind::Topics);
        assert_eq!("quiz".parse::<EntityKind>().unwrap(), EntityKind::Quizzes);
        assert_eq!(
            "quiz-questions".parse::<EntityKind>().unwrap(),
            EntityKind::QuizQuestions
        );
        assert!("users".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_summary_success_depends_on_every_error_list() {
        let now = Utc::now();

        let mut details = MigrationDetails::default();
        details.topics.migrated = 2;
        let summary = MigrationSummary::from_details(details.clone(), now, now);
        assert!(summary.success);
        assert_eq!(summary.message, "Migration completed: 2 records migrated");

        details.quiz_questions.error("question 3: missing question");
        let summary = MigrationSummary::from_details(details.clone(), now, now);
        assert!(!summary.success);

        let mut details = MigrationDetails::default();
        details.errors.push("failed to list topics".into());
        assert!(!MigrationSummary::from_details(details, now, now).success);
    }

    #[test]
    fn test_summary_serializes_with_snake_case_reports() {
        let now = Utc::now();
        let summary = MigrationSummary::from_details(MigrationDetails::default(), now, now);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["details"]["quiz_questions"]["attempted"], 0);
        assert!(json["details"]["errors"].as_array().unwrap().is_empty());
    }
}
