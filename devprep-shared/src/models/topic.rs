//! Topic lessons
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE topics (
//!     id UUID PRIMARY KEY,
//!     title TEXT NOT NULL,
//!     slug TEXT NOT NULL UNIQUE,
//!     description TEXT NOT NULL DEFAULT '',
//!     content JSONB NOT NULL DEFAULT '""',
//!     level content_level NOT NULL DEFAULT 'junior',
//!     estimated_time INTEGER NOT NULL DEFAULT 0,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use super::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A lesson on a single Flutter/Dart topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,

    pub title: String,

    /// URL-safe unique key
    pub slug: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub content: TopicContent,

    #[serde(default)]
    pub level: Level,

    /// Reading time in minutes
    #[serde(default)]
    pub estimated_time: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Lesson body: either one markdown string or an ordered list of sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicContent {
    Text(String),
    Sections(Vec<TopicSection>),
}

impl Default for TopicContent {
    fn default() -> Self {
        TopicContent::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSection {
    pub title: String,

    #[serde(default)]
    pub body: String,
}

impl TopicContent {
    /// Whether the lesson has any readable text
    pub fn is_empty(&self) -> bool {
        match self {
            TopicContent::Text(text) => text.trim().is_empty(),
            TopicContent::Sections(sections) => sections.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_accepts_string_or_sections() {
        let text: TopicContent = serde_json::from_value(json!("# Widgets")).unwrap();
        assert_eq!(text, TopicContent::Text("# Widgets".to_string()));

        let sections: TopicContent = serde_json::from_value(json!([
            {"title": "Stateless", "body": "..."},
            {"title": "Stateful"}
        ]))
        .unwrap();
        match sections {
            TopicContent::Sections(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[1].title, "Stateful");
                assert_eq!(list[1].body, "");
            }
            other => panic!("expected sections, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_defaults_missing_fields() {
        let topic: Topic = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "title": "Flutter Basics",
            "slug": "flutter-basics",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(topic.level, Level::Junior);
        assert_eq!(topic.estimated_time, 0);
        assert!(topic.content.is_empty());
    }
}
