//! Quizzes and quiz questions
//!
//! A quiz owns an ordered list of questions. Each question's options are a
//! label → text map (`{"a": "StatelessWidget", "b": "StatefulWidget"}`) and
//! `correct_answer` names one of the labels.
//!
//! The relational store keeps `options` as JSON-encoded TEXT. Legacy rows
//! exist whose text is not valid JSON; those decode to an empty map (with a
//! warning) rather than failing the whole quiz.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE quizzes (
//!     id UUID PRIMARY KEY,
//!     slug TEXT NOT NULL UNIQUE,
//!     title TEXT NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     level content_level NOT NULL DEFAULT 'junior',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE quiz_questions (
//!     id UUID PRIMARY KEY,
//!     quiz_id UUID NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
//!     question TEXT NOT NULL,
//!     options TEXT NOT NULL DEFAULT '{}',
//!     correct_answer TEXT NOT NULL DEFAULT '',
//!     explanation TEXT NOT NULL DEFAULT '',
//!     category TEXT NOT NULL DEFAULT 'general',
//!     position INTEGER NOT NULL DEFAULT 0
//! );
//! ```

use super::definition::default_category;
use super::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A quiz and (when loaded by slug) its questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,

    /// Unique natural key
    pub slug: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub level: Level,

    /// Ordered by `position`; empty in list views
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A single multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,

    pub quiz_id: Uuid,

    pub question: String,

    /// Option label → option text
    #[serde(default, deserialize_with = "options_map")]
    pub options: BTreeMap<String, String>,

    /// Label of the correct option
    #[serde(default)]
    pub correct_answer: String,

    #[serde(default)]
    pub explanation: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub position: i32,
}

impl QuizQuestion {
    /// Whether `answer` is the correct option label
    pub fn is_correct(&self, answer: &str) -> bool {
        !self.correct_answer.is_empty() && self.correct_answer == answer.trim()
    }
}

impl Quiz {
    /// Scores a set of answers keyed by question id
    ///
    /// Returns `(correct, total)` where total is the number of questions.
    pub fn score(&self, answers: &BTreeMap<Uuid, String>) -> (i32, i32) {
        let correct = self
            .questions
            .iter()
            .filter(|q| answers.get(&q.id).is_some_and(|a| q.is_correct(a)))
            .count();

        (correct as i32, self.questions.len() as i32)
    }
}

/// Converts a raw options value into a label → text map
///
/// Accepts a JSON object or a string containing a JSON object. Non-string
/// option values are rendered with their JSON text. Anything else yields an
/// empty map and a warning.
pub fn parse_options(value: &JsonValue) -> BTreeMap<String, String> {
    match value {
        JsonValue::Object(map) => map
            .iter()
            .map(|(label, text)| {
                let text = match text {
                    JsonValue::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                };
                (label.trim().to_string(), text)
            })
            .collect(),
        JsonValue::String(raw) if raw.trim().is_empty() => BTreeMap::new(),
        JsonValue::String(raw) => match serde_json::from_str::<JsonValue>(raw) {
            Ok(parsed @ JsonValue::Object(_)) => parse_options(&parsed),
            Ok(_) | Err(_) => {
                tracing::warn!(raw = %raw, "Unparseable quiz options, defaulting to empty map");
                BTreeMap::new()
            }
        },
        JsonValue::Null => BTreeMap::new(),
        other => {
            tracing::warn!(value = %other, "Unexpected quiz options shape, defaulting to empty map");
            BTreeMap::new()
        }
    }
}

fn options_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(parse_options(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(id: Uuid, correct: &str) -> QuizQuestion {
        QuizQuestion {
            id,
            quiz_id: Uuid::nil(),
            question: "Which widget rebuilds?".to_string(),
            options: BTreeMap::from([
                ("a".to_string(), "StatelessWidget".to_string()),
                ("b".to_string(), "StatefulWidget".to_string()),
            ]),
            correct_answer: correct.to_string(),
            explanation: String::new(),
            category: "widgets".to_string(),
            position: 0,
        }
    }

    #[test]
    fn test_parse_options_object_and_string() {
        let from_object = parse_options(&json!({"a": "One", "b": 2}));
        assert_eq!(from_object.get("a").unwrap(), "One");
        assert_eq!(from_object.get("b").unwrap(), "2");

        let from_string = parse_options(&json!("{\"a\": \"One\"}"));
        assert_eq!(from_string.len(), 1);
    }

    #[test]
    fn test_parse_options_malformed_is_empty() {
        assert!(parse_options(&json!("{a: One,,")).is_empty());
        assert!(parse_options(&json!("[1, 2]")).is_empty());
        assert!(parse_options(&json!(42)).is_empty());
        assert!(parse_options(&JsonValue::Null).is_empty());
    }

    #[test]
    fn test_question_deserializes_string_options() {
        let q: QuizQuestion = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "quiz_id": Uuid::new_v4(),
            "question": "What is a Future?",
            "options": "{\"a\": \"A value later\", \"b\": \"A widget\"}",
            "correct_answer": "a"
        }))
        .unwrap();

        assert_eq!(q.options.len(), 2);
        assert!(q.is_correct("a"));
        assert!(!q.is_correct("b"));
        assert_eq!(q.category, "general");
    }

    #[test]
    fn test_quiz_score() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let quiz = Quiz {
            id: Uuid::new_v4(),
            slug: "widgets".to_string(),
            title: "Widgets".to_string(),
            description: String::new(),
            level: Level::Junior,
            questions: vec![question(first, "b"), question(second, "a")],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let answers = BTreeMap::from([(first, "b".to_string()), (second, "b".to_string())]);
        assert_eq!(quiz.score(&answers), (1, 2));
    }
}
