//! Batch copy from the source store to the target store
//!
//! Records are processed one at a time and in order. For each one the
//! runner reads its natural key, skips it if the target (or the current run)
//! already has that key, sanitizes it, and queues it in a [`WriteBatch`]. A
//! batch is committed when it reaches the configured size and at the end of
//! every entity pass. Counts only move to `migrated` once their batch has
//! committed; a failed commit adds one error per queued record.
//!
//! A key counts as done for the rest of the pass only after its commit
//! lands. A duplicate of a key still waiting in the batch commits that batch
//! first, so a later copy is skipped only if an earlier one reached the
//! target.
//!
//! Quiz questions travel with their quiz: they are read from the source by
//! the source quiz id, re-pointed at the quiz id written to the target, and
//! queued in the same batch as the quiz.

use super::report::{EntityKind, MigrationDetails, MigrationSummary};
use super::sanitize::{read_id, read_key, sanitize};
use crate::backends::{Collection, Document, DocumentStore, WriteBatch};
use chrono::Utc;
use devprep_shared::config::MigrationConfig;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

/// Copies content from `source` into `target`
pub struct MigrationRunner {
    source: Arc<dyn DocumentStore>,
    target: Arc<dyn DocumentStore>,
    config: MigrationConfig,
}

/// Writes queued for the next commit, with who to credit once it lands
struct PendingBatch {
    batch: WriteBatch,
    entries: Vec<(EntityKind, String)>,
    limit: usize,

    /// Natural keys in the uncommitted batch
    queued: HashSet<String>,

    /// Natural keys whose batch has committed
    committed: HashSet<String>,
}

impl PendingBatch {
    fn new(limit: usize) -> Self {
        Self {
            batch: WriteBatch::new(),
            entries: Vec::new(),
            limit: limit.clamp(1, WriteBatch::MAX_WRITES),
            queued: HashSet::new(),
            committed: HashSet::new(),
        }
    }

    fn is_queued(&self, key: &str) -> bool {
        self.queued.contains(key)
    }

    fn is_committed(&self, key: &str) -> bool {
        self.committed.contains(key)
    }

    fn len(&self) -> usize {
        self.batch.len()
    }

    fn has_room_for(&self, writes: usize) -> bool {
        self.len() + writes <= self.limit
    }

    /// Queues a write, committing first if the batch is full. Returns whether
    /// the write was queued.
    async fn push(
        &mut self,
        target: &dyn DocumentStore,
        details: &mut MigrationDetails,
        kind: EntityKind,
        label: String,
        id: String,
        document: Document,
    ) -> bool {
        if !self.has_room_for(1) {
            self.flush(target, details).await;
        }

        match self.batch.set(kind.collection(), id, document) {
            Ok(()) => {
                self.entries.push((kind, label));
                true
            }
            Err(e) => {
                details.report_mut(kind).error(format!("{}: {}", label, e));
                false
            }
        }
    }

    /// Queues a record under its natural key
    async fn push_keyed(
        &mut self,
        target: &dyn DocumentStore,
        details: &mut MigrationDetails,
        kind: EntityKind,
        key: String,
        id: String,
        document: Document,
    ) {
        if self
            .push(target, details, kind, key.clone(), id, document)
            .await
        {
            self.queued.insert(key);
        }
    }

    /// Commits whatever is queued
    async fn flush(&mut self, target: &dyn DocumentStore, details: &mut MigrationDetails) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        let entries = std::mem::take(&mut self.entries);
        let keys = std::mem::take(&mut self.queued);
        let writes = batch.len();

        match target.commit(batch).await {
            Ok(()) => {
                tracing::debug!(target_store = target.name(), writes, "Migration batch committed");
                self.committed.extend(keys);
                for (kind, _) in entries {
                    details.report_mut(kind).migrated += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    target_store = target.name(),
                    writes,
                    error = %e,
                    "Migration batch commit failed"
                );
                for (kind, label) in entries {
                    details
                        .report_mut(kind)
                        .error(format!("{}: batch commit failed: {}", label, e));
                }
            }
        }
    }
}

impl MigrationRunner {
    pub fn new(
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrates every entity type
    pub async fn run(&self) -> MigrationSummary {
        self.run_selected(&EntityKind::SELECTABLE).await
    }

    /// Migrates the requested entity types, in the standard order
    ///
    /// Requesting quiz questions migrates quizzes, since questions only move
    /// with their quiz.
    pub async fn run_selected(&self, kinds: &[EntityKind]) -> MigrationSummary {
        let started_at = Utc::now();
        let mut details = MigrationDetails::default();

        tracing::info!(
            source = self.source.name(),
            target = self.target.name(),
            batch_size = self.config.batch_size,
            "Migration starting"
        );

        for kind in EntityKind::SELECTABLE {
            let requested = kinds.contains(&kind)
                || (kind == EntityKind::Quizzes && kinds.contains(&EntityKind::QuizQuestions));
            if requested {
                self.migrate_entity(kind, &mut details).await;
            }
        }

        let summary = MigrationSummary::from_details(details, started_at, Utc::now());

        if summary.success {
            tracing::info!(message = %summary.message, "Migration finished");
        } else {
            tracing::warn!(
                message = %summary.message,
                errors = summary.details.total_errors(),
                "Migration finished with errors"
            );
        }

        summary
    }

    async fn migrate_entity(&self, kind: EntityKind, details: &mut MigrationDetails) {
        let collection = kind.collection();
        let Some(key_field) = collection.natural_key() else {
            details
                .errors
                .push(format!("{} has no natural key and cannot be migrated directly", kind));
            return;
        };

        let records = match self.source.list(collection).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(entity = %kind, error = %e, "Failed to list source records");
                details.errors.push(format!("Failed to list {}: {}", kind, e));
                return;
            }
        };

        tracing::info!(entity = %kind, records = records.len(), "Migrating entity");

        let target = self.target.as_ref();
        let mut pending = PendingBatch::new(self.config.batch_size);

        for raw in records {
            details.report_mut(kind).attempted += 1;

            let Some(key) = read_key(&raw, key_field) else {
                let id = read_id(&raw).unwrap_or_else(|| "<no id>".to_string());
                details
                    .report_mut(kind)
                    .error(format!("record {}: missing {}", id, key_field));
                continue;
            };

            if pending.is_queued(&key) {
                pending.flush(target, details).await;
            }
            if pending.is_committed(&key) {
                details.report_mut(kind).skipped += 1;
                continue;
            }

            match target.find_one(collection, key_field, &key).await {
                Ok(Some(_)) => {
                    tracing::debug!(entity = %kind, key = %key, "Already in target, skipping");
                    details.report_mut(kind).skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    details
                        .report_mut(kind)
                        .error(format!("{}: existence check failed: {}", key, e));
                    continue;
                }
            }

            let clean = match sanitize(collection, &raw) {
                Ok(clean) => clean,
                Err(e) => {
                    details.report_mut(kind).error(format!("{}: {}", key, e));
                    continue;
                }
            };
            let Some(id) = document_id(&clean) else {
                details.report_mut(kind).error(format!("{}: sanitized record has no id", key));
                continue;
            };

            let questions = if kind == EntityKind::Quizzes {
                let Some(source_id) = read_id(&raw) else {
                    details.report_mut(kind).error(format!("{}: missing id", key));
                    continue;
                };
                match self.quiz_questions(&key, &source_id, &id, details).await {
                    Ok(questions) => questions,
                    Err(message) => {
                        details.report_mut(kind).error(message);
                        continue;
                    }
                }
            } else {
                Vec::new()
            };

            // Keep a quiz and its questions in one commit when they fit
            if !pending.has_room_for(1 + questions.len()) {
                pending.flush(target, details).await;
            }

            pending
                .push_keyed(target, details, kind, key, id, clean)
                .await;
            for (label, question_id, question) in questions {
                pending
                    .push(target, details, EntityKind::QuizQuestions, label, question_id, question)
                    .await;
            }
        }

        pending.flush(target, details).await;

        let report = details.report(kind);
        tracing::info!(
            entity = %kind,
            attempted = report.attempted,
            migrated = report.migrated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Entity migrated"
        );
    }

    /// Sanitized questions for a quiz, tagged with its target id
    ///
    /// Per-question problems are recorded against quiz questions and the
    /// question dropped; failing to load them at all is returned as an error
    /// for the quiz.
    async fn quiz_questions(
        &self,
        quiz_key: &str,
        source_quiz_id: &str,
        target_quiz_id: &str,
        details: &mut MigrationDetails,
    ) -> Result<Vec<(String, String, Document)>, String> {
        let raw_questions = self
            .source
            .find_all(Collection::QuizQuestions, "quiz_id", source_quiz_id)
            .await
            .map_err(|e| format!("{}: failed to load questions: {}", quiz_key, e))?;

        let mut questions = Vec::with_capacity(raw_questions.len());

        for (index, raw) in raw_questions.into_iter().enumerate() {
            details.quiz_questions.attempted += 1;
            let label = format!("{} question {}", quiz_key, index + 1);

            let mut clean = match sanitize(Collection::QuizQuestions, &raw) {
                Ok(clean) => clean,
                Err(e) => {
                    details.quiz_questions.error(format!("{}: {}", label, e));
                    continue;
                }
            };
            clean.insert(
                "quiz_id".to_string(),
                JsonValue::String(target_quiz_id.to_string()),
            );

            match document_id(&clean) {
                Some(id) => questions.push((label, id, clean)),
                None => details
                    .quiz_questions
                    .error(format!("{}: sanitized record has no id", label)),
            }
        }

        Ok(questions)
    }
}

fn document_id(document: &Document) -> Option<String> {
    document
        .get("id")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryStore;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_pending_batch_flushes_at_limit() {
        let target = MemoryStore::new();
        let mut details = MigrationDetails::default();
        let mut pending = PendingBatch::new(2);

        for i in 0..5 {
            pending
                .push(
                    &target,
                    &mut details,
                    EntityKind::Definitions,
                    format!("term-{}", i),
                    i.to_string(),
                    doc(json!({"term": format!("term-{}", i)})),
                )
                .await;
        }
        assert_eq!(target.commits(), 2);
        assert_eq!(details.definitions.migrated, 4);

        pending.flush(&target, &mut details).await;
        assert_eq!(target.commits(), 3);
        assert_eq!(details.definitions.migrated, 5);
    }

    #[tokio::test]
    async fn test_flush_of_empty_batch_does_nothing() {
        let target = MemoryStore::new();
        let mut details = MigrationDetails::default();

        PendingBatch::new(10).flush(&target, &mut details).await;
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test]
    async fn test_keys_count_as_done_only_after_commit() {
        let target = MemoryStore::new();
        let mut details = MigrationDetails::default();
        let mut pending = PendingBatch::new(10);

        pending
            .push_keyed(
                &target,
                &mut details,
                EntityKind::Topics,
                "widgets".to_string(),
                "1".to_string(),
                doc(json!({"slug": "widgets"})),
            )
            .await;
        assert!(pending.is_queued("widgets"));
        assert!(!pending.is_committed("widgets"));

        target.fail_commits(true);
        pending.flush(&target, &mut details).await;
        assert!(!pending.is_queued("widgets"));
        assert!(!pending.is_committed("widgets"));

        target.fail_commits(false);
        pending
            .push_keyed(
                &target,
                &mut details,
                EntityKind::Topics,
                "widgets".to_string(),
                "1".to_string(),
                doc(json!({"slug": "widgets"})),
            )
            .await;
        pending.flush(&target, &mut details).await;
        assert!(pending.is_committed("widgets"));
        assert_eq!(details.topics.migrated, 1);
        assert_eq!(details.topics.errors.len(), 1);
    }

    #[test]
    fn test_batch_limit_is_clamped() {
        assert_eq!(PendingBatch::new(0).limit, 1);
        assert_eq!(PendingBatch::new(10_000).limit, WriteBatch::MAX_WRITES);
    }
}
