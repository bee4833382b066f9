//! Glossary definitions
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE definitions (
//!     id UUID PRIMARY KEY,
//!     term TEXT NOT NULL UNIQUE,
//!     definition TEXT NOT NULL DEFAULT '',
//!     category TEXT NOT NULL DEFAULT 'general',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A glossary term and its explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Definition {
    pub id: Uuid,

    /// Unique natural key
    pub term: String,

    #[serde(default)]
    pub definition: String,

    #[serde(default = "default_category")]
    pub category: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

pub(crate) fn default_category() -> String {
    "general".to_string()
}
