//! Sample projects
//!
//! Projects carry two nested collections, technologies and features. Records
//! written by the relational store hold them as JSON arrays; records written
//! through the document store have historically held them as keyed maps
//! (`{"0": {...}, "1": {...}}` or `{"riverpod": {...}}`). Every read path runs
//! the raw value through [`normalize_nested`] so callers only ever see an
//! ordered `Vec`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE projects (
//!     id UUID PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     slug TEXT NOT NULL UNIQUE,
//!     description TEXT NOT NULL DEFAULT '',
//!     difficulty content_level NOT NULL DEFAULT 'junior',
//!     category TEXT NOT NULL DEFAULT 'general',
//!     github_url TEXT,
//!     demo_url TEXT,
//!     technologies JSONB NOT NULL DEFAULT '[]',
//!     features JSONB NOT NULL DEFAULT '[]',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use super::definition::default_category;
use super::Level;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use uuid::Uuid;

/// A portfolio project idea
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,

    pub name: String,

    /// Unique natural key
    pub slug: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub difficulty: Level,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<String>,

    #[serde(default, deserialize_with = "list_or_map")]
    pub technologies: Vec<Technology>,

    #[serde(default, deserialize_with = "list_or_map")]
    pub features: Vec<Feature>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A technology used by a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,

    #[serde(default)]
    pub explanation: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_category")]
    pub category: String,
}

/// A feature the project should implement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// Normalizes a nested collection to an ordered list
///
/// - an array passes through element by element
/// - a keyed map becomes a list ordered by key (numeric keys numerically,
///   then the rest lexically); an entry without a `name` takes its key as name
/// - `null` becomes an empty list
///
/// # Errors
///
/// Returns an error for any other JSON shape or for elements that do not
/// deserialize into `T`.
///
/// # Example
///
/// ```
/// use devprep_shared::models::{normalize_nested, Technology};
/// use serde_json::json;
///
/// let from_map: Vec<Technology> = normalize_nested(json!({
///     "1": {"name": "Dio"},
///     "0": {"name": "Riverpod"}
/// })).unwrap();
/// assert_eq!(from_map[0].name, "Riverpod");
/// assert_eq!(from_map[1].name, "Dio");
/// ```
pub fn normalize_nested<T: DeserializeOwned>(value: JsonValue) -> Result<Vec<T>, serde_json::Error> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        JsonValue::Object(map) => {
            let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));

            entries
                .into_iter()
                .map(|(key, mut item)| {
                    if let JsonValue::Object(fields) = &mut item {
                        if !fields.contains_key("name") {
                            fields.insert("name".to_string(), JsonValue::String(key));
                        }
                    }
                    serde_json::from_value(item)
                })
                .collect()
        }
        other => Err(serde_json::Error::custom(format!(
            "expected a list or keyed map, got {}",
            other
        ))),
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn list_or_map<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = JsonValue::deserialize(deserializer)?;
    normalize_nested(value).map_err(D::Error::custom)
}
