//! Content migration between stores
//!
//! Copies topics, definitions, projects and quizzes (with their questions)
//! from one [`DocumentStore`](crate::backends::DocumentStore) to another,
//! de-duplicating on natural keys so a run can be repeated safely.
//!
//! # Example
//!
//! ```
//! use devprep_shared::config::MigrationConfig;
//! use devprep_store::backends::{Collection, MemoryStore};
//! use devprep_store::migration::MigrationRunner;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = Arc::new(MemoryStore::named("postgres"));
//! source.insert(Collection::Definitions, "1", json!({"term": "Widget"}));
//! let target = Arc::new(MemoryStore::named("redis"));
//!
//! let runner = MigrationRunner::new(source, target.clone(), MigrationConfig::default());
//! let summary = runner.run().await;
//!
//! assert!(summary.success);
//! assert_eq!(summary.details.definitions.migrated, 1);
//! assert_eq!(target.count(Collection::Definitions), 1);
//! # }
//! ```

pub mod report;
pub mod runner;
pub mod sanitize;

pub use report::{EntityKind, EntityReport, MigrationDetails, MigrationSummary};
pub use runner::MigrationRunner;
pub use sanitize::{sanitize, SanitizeError};
