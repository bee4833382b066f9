//! Record sanitization
//!
//! Source records are coerced into the shape the target expects before they
//! are written:
//!
//! - strings are trimmed; empty optional strings and `null`s are dropped
//! - integers, booleans, levels and timestamps are coerced from whatever
//!   representation the source used
//! - missing fields with a default get it; missing required fields are an
//!   error
//! - ids are kept when they are UUIDs, otherwise a new one is minted
//! - nested lists are normalized and each element sanitized in turn
//! - string-encoded option maps are parsed, falling back to `{}`
//! - fields the schema does not name are dropped
//!
//! Fields are looked up by their snake_case name first, then camelCase.

use crate::backends::{Collection, Document};
use chrono::{DateTime, NaiveDateTime, Utc};
use devprep_shared::config::parse_flag;
use devprep_shared::models::quiz::parse_options;
use devprep_shared::models::{normalize_nested, Level, TopicContent};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl SanitizeError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SanitizeError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    /// UUID kept when valid, minted otherwise
    Id,

    /// UUID pointing at another record; dropped when invalid
    Reference,

    /// Natural key: required, trimmed
    Key,

    RequiredText,
    Text(&'static str),
    OptionalText,
    Integer(i64),
    Boolean(bool),
    Level,

    /// RFC 3339 output; missing means now
    Timestamp,

    /// Topic body: string or section list
    Content,

    /// Quiz option map
    Options,

    /// List or keyed map of sub-records
    Nested(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

const TOPIC: &[Field] = &[
    field("id", FieldKind::Id),
    field("title", FieldKind::RequiredText),
    field("slug", FieldKind::Key),
    field("description", FieldKind::Text("")),
    field("content", FieldKind::Content),
    field("level", FieldKind::Level),
    field("estimated_time", FieldKind::Integer(0)),
    field("created_at", FieldKind::Timestamp),
    field("updated_at", FieldKind::Timestamp),
];

const DEFINITION: &[Field] = &[
    field("id", FieldKind::Id),
    field("term", FieldKind::Key),
    field("definition", FieldKind::Text("")),
    field("category", FieldKind::Text("general")),
    field("created_at", FieldKind::Timestamp),
    field("updated_at", FieldKind::Timestamp),
];

const TECHNOLOGY: &[Field] = &[
    field("name", FieldKind::RequiredText),
    field("explanation", FieldKind::Text("")),
    field("required", FieldKind::Boolean(false)),
    field("category", FieldKind::Text("general")),
];

const FEATURE: &[Field] = &[
    field("name", FieldKind::RequiredText),
    field("description", FieldKind::Text("")),
    field("priority", FieldKind::Text("medium")),
];

const PROJECT: &[Field] = &[
    field("id", FieldKind::Id),
    field("name", FieldKind::RequiredText),
    field("slug", FieldKind::Key),
    field("description", FieldKind::Text("")),
    field("difficulty", FieldKind::Level),
    field("category", FieldKind::Text("general")),
    field("github_url", FieldKind::OptionalText),
    field("demo_url", FieldKind::OptionalText),
    field("technologies", FieldKind::Nested(TECHNOLOGY)),
    field("features", FieldKind::Nested(FEATURE)),
    field("created_at", FieldKind::Timestamp),
    field("updated_at", FieldKind::Timestamp),
];

const QUIZ: &[Field] = &[
    field("id", FieldKind::Id),
    field("slug", FieldKind::Key),
    field("title", FieldKind::RequiredText),
    field("description", FieldKind::Text("")),
    field("level", FieldKind::Level),
    field("created_at", FieldKind::Timestamp),
    field("updated_at", FieldKind::Timestamp),
];

const QUIZ_QUESTION: &[Field] = &[
    field("id", FieldKind::Id),
    field("quiz_id", FieldKind::Reference),
    field("question", FieldKind::RequiredText),
    field("options", FieldKind::Options),
    field("correct_answer", FieldKind::Text("")),
    field("explanation", FieldKind::Text("")),
    field("category", FieldKind::Text("general")),
    field("position", FieldKind::Integer(0)),
];

fn schema(collection: Collection) -> Option<&'static [Field]> {
    match collection {
        Collection::Topics => Some(TOPIC),
        Collection::Definitions => Some(DEFINITION),
        Collection::Projects => Some(PROJECT),
        Collection::Quizzes => Some(QUIZ),
        Collection::QuizQuestions => Some(QUIZ_QUESTION),
        _ => None,
    }
}

/// Sanitizes a source record for `collection`
///
/// # Errors
///
/// `MissingField` for an absent required field, `InvalidField` for a value
/// that cannot be coerced, or for a collection the runner does not migrate.
pub fn sanitize(collection: Collection, raw: &Document) -> Result<Document, SanitizeError> {
    let fields = schema(collection)
        .ok_or_else(|| SanitizeError::invalid("collection", format!("{} is not migrated", collection)))?;
    sanitize_fields(fields, raw)
}

/// Natural key of a source record: a trimmed, non-empty string or number
pub fn read_key(raw: &Document, field: &str) -> Option<String> {
    match lookup(raw, field)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Id of a source record as stored there
pub fn read_id(raw: &Document) -> Option<String> {
    read_key(raw, "id")
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn lookup<'a>(raw: &'a Document, name: &str) -> Option<&'a JsonValue> {
    raw.get(name)
        .or_else(|| raw.get(&camel_case(name)))
        .filter(|value| !value.is_null())
}

fn sanitize_fields(fields: &[Field], raw: &Document) -> Result<Document, SanitizeError> {
    let mut out = Map::new();

    for field in fields {
        if let Some(value) = sanitize_field(field, lookup(raw, field.name))? {
            out.insert(field.name.to_string(), value);
        }
    }

    Ok(out)
}

fn sanitize_field(field: &Field, value: Option<&JsonValue>) -> Result<Option<JsonValue>, SanitizeError> {
    let name = field.name;

    let sanitized = match field.kind {
        FieldKind::Id => {
            let id = value
                .and_then(JsonValue::as_str)
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .unwrap_or_else(Uuid::new_v4);
            Some(JsonValue::String(id.to_string()))
        }
        FieldKind::Reference => value
            .and_then(JsonValue::as_str)
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|id| JsonValue::String(id.to_string())),
        FieldKind::Key | FieldKind::RequiredText => match value.and_then(text) {
            Some(s) if !s.is_empty() => Some(JsonValue::String(s)),
            _ => return Err(SanitizeError::MissingField(name)),
        },
        FieldKind::Text(default) => Some(JsonValue::String(
            value.and_then(text).unwrap_or_else(|| default.to_string()),
        )),
        FieldKind::OptionalText => value
            .and_then(text)
            .filter(|s| !s.is_empty())
            .map(JsonValue::String),
        FieldKind::Integer(default) => Some(JsonValue::from(match value {
            Some(value) => integer(name, value)?,
            None => default,
        })),
        FieldKind::Boolean(default) => Some(JsonValue::Bool(match value {
            Some(value) => boolean(name, value)?,
            None => default,
        })),
        FieldKind::Level => {
            let level = match value {
                Some(JsonValue::String(s)) if !s.trim().is_empty() => s
                    .parse::<Level>()
                    .map_err(|e| SanitizeError::invalid(name, e))?,
                Some(JsonValue::String(_)) | None => Level::default(),
                Some(other) => {
                    return Err(SanitizeError::invalid(name, format!("expected a level, got {}", other)))
                }
            };
            Some(JsonValue::String(level.to_string()))
        }
        FieldKind::Timestamp => {
            let at = match value {
                Some(value) => timestamp(name, value)?,
                None => Utc::now(),
            };
            Some(JsonValue::String(at.to_rfc3339()))
        }
        FieldKind::Content => Some(content(name, value)?),
        FieldKind::Options => {
            let options = value.map(parse_options).unwrap_or_default();
            Some(serde_json::to_value(options).map_err(|e| SanitizeError::invalid(name, e.to_string()))?)
        }
        FieldKind::Nested(schema) => {
            let items = match value {
                Some(value) => normalize_nested::<JsonValue>(value.clone())
                    .map_err(|e| SanitizeError::invalid(name, e.to_string()))?,
                None => Vec::new(),
            };

            let mut sanitized = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let item = match item {
                    JsonValue::Object(map) => map,
                    JsonValue::String(label) => {
                        let mut map = Map::new();
                        map.insert("name".to_string(), JsonValue::String(label));
                        map
                    }
                    other => {
                        return Err(SanitizeError::invalid(
                            name,
                            format!("element {} is not an object: {}", index, other),
                        ))
                    }
                };

                let item = sanitize_fields(schema, &item).map_err(|e| {
                    SanitizeError::invalid(name, format!("element {}: {}", index, e))
                })?;
                sanitized.push(JsonValue::Object(item));
            }
            Some(JsonValue::Array(sanitized))
        }
    };

    Ok(sanitized)
}

fn text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer(name: &str, value: &JsonValue) -> Result<i64, SanitizeError> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| SanitizeError::invalid(name, format!("not an integer: {}", n))),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f.round() as i64))
                .map_err(|_| SanitizeError::invalid(name, format!("not an integer: '{}'", s)))
        }
        JsonValue::Bool(b) => Ok(i64::from(*b)),
        other => Err(SanitizeError::invalid(name, format!("not an integer: {}", other))),
    }
}

fn boolean(name: &str, value: &JsonValue) -> Result<bool, SanitizeError> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        JsonValue::String(s) => {
            parse_flag(name, s).map_err(|e| SanitizeError::invalid(name, e.to_string()))
        }
        other => Err(SanitizeError::invalid(name, format!("not a boolean: {}", other))),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, unix seconds or milliseconds,
/// and `{seconds, nanoseconds}` objects (with or without leading `_`)
fn timestamp(name: &str, value: &JsonValue) -> Result<DateTime<Utc>, SanitizeError> {
    let invalid = || SanitizeError::invalid(name, format!("not a timestamp: {}", value));

    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(s) {
                return Ok(at.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .map(|naive| naive.and_utc())
                .ok_or_else(invalid)
        }
        JsonValue::Number(n) => {
            let n = n.as_i64().ok_or_else(invalid)?;
            // Anything past year 5138 in seconds is taken as milliseconds
            let at = if n.unsigned_abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(n)
            } else {
                DateTime::from_timestamp(n, 0)
            };
            at.ok_or_else(invalid)
        }
        JsonValue::Object(map) => {
            let part = |key: &str| {
                map.get(key)
                    .or_else(|| map.get(&format!("_{}", key)))
                    .and_then(JsonValue::as_i64)
            };
            let seconds = part("seconds").ok_or_else(invalid)?;
            let nanos = part("nanoseconds").unwrap_or(0);
            let nanos = u32::try_from(nanos).map_err(|_| invalid())?;
            DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn content(name: &str, value: Option<&JsonValue>) -> Result<JsonValue, SanitizeError> {
    match value {
        None => Ok(JsonValue::String(String::new())),
        Some(JsonValue::String(s)) => {
            // Some sources store the section list as JSON text
            if s.trim_start().starts_with('[') {
                if let Ok(sections @ JsonValue::Array(_)) = serde_json::from_str::<JsonValue>(s) {
                    return content(name, Some(&sections));
                }
            }
            Ok(JsonValue::String(s.clone()))
        }
        Some(value) => {
            let sections = normalize_nested::<JsonValue>(value.clone())
                .map_err(|e| SanitizeError::invalid(name, e.to_string()))?;
            let content: TopicContent = serde_json::from_value(JsonValue::Array(sections))
                .map_err(|e| SanitizeError::invalid(name, e.to_string()))?;
            serde_json::to_value(content).map_err(|e| SanitizeError::invalid(name, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_topic_coercion() {
        let id = Uuid::new_v4();
        let raw = doc(json!({
            "id": id.to_string(),
            "title": "  Flutter Basics ",
            "slug": "flutter-basics",
            "description": null,
            "level": "Beginner",
            "estimatedTime": "15",
            "created_at": {"_seconds": 1_700_000_000, "_nanoseconds": 0},
            "legacy_field": "dropped"
        }));

        let clean = sanitize(Collection::Topics, &raw).unwrap();

        assert_eq!(clean["id"], id.to_string());
        assert_eq!(clean["title"], "Flutter Basics");
        assert_eq!(clean["description"], "");
        assert_eq!(clean["level"], "junior");
        assert_eq!(clean["estimated_time"], 15);
        assert_eq!(clean["content"], "");
        assert!(clean["created_at"].as_str().unwrap().starts_with("2023-11-14T22:13:20"));
        assert!(clean.contains_key("updated_at"));
        assert!(!clean.contains_key("legacy_field"));
    }

    #[test]
    fn test_non_uuid_id_is_replaced() {
        let raw = doc(json!({"id": "firestore-abc123", "term": "Widget"}));
        let clean = sanitize(Collection::Definitions, &raw).unwrap();

        let id = clean["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(clean["category"], "general");
    }

    #[test]
    fn test_missing_required_field() {
        let raw = doc(json!({"slug": "state-management"}));
        assert_eq!(
            sanitize(Collection::Topics, &raw),
            Err(SanitizeError::MissingField("title"))
        );
    }

    #[test]
    fn test_invalid_integer() {
        let raw = doc(json!({"title": "T", "slug": "t", "estimated_time": "soon"}));
        assert!(matches!(
            sanitize(Collection::Topics, &raw),
            Err(SanitizeError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_project_nested_lists_normalized() {
        let raw = doc(json!({
            "name": "Weather App",
            "slug": "weather-app",
            "difficulty": "intermediate",
            "github_url": "   ",
            "technologies": {
                "1": {"name": "Dio", "required": "yes"},
                "0": {"name": "Riverpod"}
            },
            "features": ["Offline mode"]
        }));

        let clean = sanitize(Collection::Projects, &raw).unwrap();

        assert_eq!(clean["difficulty"], "middle");
        assert!(!clean.contains_key("github_url"));
        assert_eq!(clean["technologies"][0]["name"], "Riverpod");
        assert_eq!(clean["technologies"][1]["required"], true);
        assert_eq!(clean["features"][0]["name"], "Offline mode");
        assert_eq!(clean["features"][0]["priority"], "medium");
    }

    #[test]
    fn test_question_options() {
        let raw = doc(json!({
            "question": "Which widget rebuilds?",
            "options": "{\"a\": \"StatelessWidget\", \"b\": \"StatefulWidget\"}",
            "position": 2.0
        }));
        let clean = sanitize(Collection::QuizQuestions, &raw).unwrap();
        assert_eq!(clean["options"]["b"], "StatefulWidget");
        assert_eq!(clean["position"], 2);

        let raw = doc(json!({"question": "Broken?", "options": "{a: oops"}));
        let clean = sanitize(Collection::QuizQuestions, &raw).unwrap();
        assert_eq!(clean["options"], json!({}));
    }

    #[test]
    fn test_content_sections() {
        let raw = doc(json!({
            "title": "Layouts",
            "slug": "layouts",
            "content": "[{\"title\": \"Row\", \"body\": \"Horizontal\"}]"
        }));
        let clean = sanitize(Collection::Topics, &raw).unwrap();
        assert_eq!(clean["content"][0]["title"], "Row");
    }

    #[test]
    fn test_timestamp_formats() {
        let secs = timestamp("t", &json!(1_700_000_000)).unwrap();
        let millis = timestamp("t", &json!(1_700_000_000_000_i64)).unwrap();
        let naive = timestamp("t", &json!("2023-11-14 22:13:20")).unwrap();

        assert_eq!(secs, millis);
        assert_eq!(secs, naive);
        assert!(timestamp("t", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_read_key() {
        let raw = doc(json!({"slug": "  dart ", "term": "", "id": 7}));
        assert_eq!(read_key(&raw, "slug").as_deref(), Some("dart"));
        assert_eq!(read_key(&raw, "term"), None);
        assert_eq!(read_id(&raw).as_deref(), Some("7"));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("estimated_time"), "estimatedTime");
        assert_eq!(camel_case("slug"), "slug");
    }
}
