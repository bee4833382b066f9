//! Dual-store orchestrator
//!
//! Every logical operation runs through one of two strategies:
//!
//! ```text
//! DualDatabase
//!   ├─> DualWrite:     primary ─ok─> mirror (errors recorded, never returned)
//!   └─> FallbackRead:  primary ─err/miss─> fallback (primary error kept if both fail)
//! ```
//!
//! Which store is primary and whether writes are mirrored is decided once,
//! from [`StoreConfig`], when the orchestrator is built. Write success
//! reflects the primary only; reads succeed if either store can answer.
//!
//! Records are minted here (ids, hashes, timestamps) before any store is
//! called, so the primary and the mirror receive identical records.
//!
//! # Example
//!
//! ```no_run
//! use devprep_shared::config::StoreConfig;
//! use devprep_store::backends::{Backend, DocumentBackend, MemoryStore};
//! use devprep_store::orchestrator::DualDatabase;
//! use std::sync::Arc;
//!
//! # async fn example(postgres: Arc<dyn Backend>) -> Result<(), Box<dyn std::error::Error>> {
//! let redis: Arc<dyn Backend> = Arc::new(DocumentBackend::new(Arc::new(MemoryStore::new())));
//! let db = DualDatabase::new(StoreConfig::default(), postgres, redis);
//!
//! let topic = db.get_topic_by_slug("flutter-basics").await?;
//! # Ok(())
//! # }
//! ```

use crate::backends::{Backend, StoreError, StoreResult};
use crate::events::StoreEvents;
use devprep_shared::auth::password::{generate_reset_token, hash_password, validate_password_strength};
use devprep_shared::cache::ExpiringCache;
use devprep_shared::config::{BackendKind, StoreConfig};
use devprep_shared::models::user::normalize_email;
use devprep_shared::models::{
    AuthUser, Definition, GithubIdentity, NewAccount, PasswordReset, Project, Quiz, QuizResult,
    Topic, UserTopicProgress,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::ValidateEmail;

const TOPICS_KEY: &str = "topics";

fn topic_key(slug: &str) -> String {
    format!("topic:{}", slug)
}

/// How an operation is run against the two stores
pub trait ExecutionStrategy: Send + Sync {
    /// Runs `op`, passing it whichever store(s) the strategy targets
    fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        op: F,
    ) -> impl Future<Output = StoreResult<T>> + Send
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<T>> + Send;
}

/// Writes to the primary, then mirrors to the secondary
pub struct DualWrite {
    primary: Arc<dyn Backend>,

    /// `None` when dual-write is disabled
    mirror: Option<Arc<dyn Backend>>,

    events: Arc<StoreEvents>,
}

impl DualWrite {
    pub fn new(
        primary: Arc<dyn Backend>,
        mirror: Option<Arc<dyn Backend>>,
        events: Arc<StoreEvents>,
    ) -> Self {
        Self {
            primary,
            mirror,
            events,
        }
    }

    pub fn mirrors(&self) -> bool {
        self.mirror.is_some()
    }
}

impl ExecutionStrategy for DualWrite {
    async fn execute<T, F, Fut>(&self, operation: &'static str, op: F) -> StoreResult<T>
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        let value = match op(self.primary.clone()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(
                    operation,
                    backend = self.primary.name(),
                    error = %e,
                    "Primary write failed"
                );
                return Err(e);
            }
        };

        if let Some(mirror) = &self.mirror {
            if let Err(e) = op(mirror.clone()).await {
                self.events
                    .record_divergence(operation, mirror.name(), &e.to_string());
            }
        }

        Ok(value)
    }
}

/// Reads from the primary, falling back to the secondary on failure or a miss
pub struct FallbackRead {
    primary: Arc<dyn Backend>,
    fallback: Arc<dyn Backend>,
    events: Arc<StoreEvents>,
}

impl FallbackRead {
    pub fn new(
        primary: Arc<dyn Backend>,
        fallback: Arc<dyn Backend>,
        events: Arc<StoreEvents>,
    ) -> Self {
        Self {
            primary,
            fallback,
            events,
        }
    }

    /// Lookup that also consults the fallback when the primary has no record
    ///
    /// Returns `None` only when neither store has the record. A fallback that
    /// fails after a primary miss leaves the miss as the answer.
    pub async fn execute_optional<T, F, Fut>(
        &self,
        operation: &'static str,
        op: F,
    ) -> StoreResult<Option<T>>
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<Option<T>>> + Send,
    {
        match op(self.primary.clone()).await {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => self.after_miss(operation, &op).await,
            Err(e) if e.is_authoritative() => Err(e),
            Err(e) => self.recover(operation, e, &op).await,
        }
    }

    async fn after_miss<T, F, Fut>(&self, operation: &'static str, op: &F) -> StoreResult<Option<T>>
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<Option<T>>> + Send,
    {
        tracing::debug!(
            operation,
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            "Primary has no record, trying fallback"
        );

        match op(self.fallback.clone()).await {
            Ok(Some(value)) => {
                self.served_missing_record(operation);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::debug!(
                    operation,
                    fallback = self.fallback.name(),
                    error = %e,
                    "Fallback failed after a primary miss"
                );
                Ok(None)
            }
        }
    }

    /// Retries a failed primary read against the fallback, keeping the
    /// primary's error if both fail
    async fn recover<T, F, Fut>(
        &self,
        operation: &'static str,
        primary_error: StoreError,
        op: &F,
    ) -> StoreResult<T>
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        let missing = primary_error.is_not_found();

        if missing {
            tracing::debug!(
                operation,
                primary = self.primary.name(),
                fallback = self.fallback.name(),
                error = %primary_error,
                "Primary has no record, trying fallback"
            );
        } else {
            tracing::warn!(
                operation,
                primary = self.primary.name(),
                fallback = self.fallback.name(),
                error = %primary_error,
                "Primary read failed, trying fallback"
            );
            self.events.record_fallback(operation, self.primary.name());
        }

        match op(self.fallback.clone()).await {
            Ok(value) => {
                if missing {
                    self.served_missing_record(operation);
                }
                Ok(value)
            }
            Err(fallback_error) => {
                if !missing {
                    tracing::error!(
                        operation,
                        primary = self.primary.name(),
                        fallback = self.fallback.name(),
                        primary_error = %primary_error,
                        fallback_error = %fallback_error,
                        "Both stores failed"
                    );
                }
                Err(primary_error)
            }
        }
    }

    fn served_missing_record(&self, operation: &'static str) {
        tracing::warn!(
            operation,
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            "Record missing from primary was served by fallback"
        );
        self.events.record_fallback(operation, self.primary.name());
    }
}

impl ExecutionStrategy for FallbackRead {
    async fn execute<T, F, Fut>(&self, operation: &'static str, op: F) -> StoreResult<T>
    where
        T: Send,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        match op(self.primary.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_authoritative() => Err(e),
            Err(e) => self.recover(operation, e, &op).await,
        }
    }
}

/// What `reset_password` hands back to the caller
///
/// The raw token exists only here; stores keep its SHA-256 hash. Delivering
/// it (email, reset page) is up to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetTicket {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The orchestrator: one entry point per logical operation
pub struct DualDatabase {
    config: StoreConfig,
    primary_name: &'static str,
    secondary_name: &'static str,
    writes: DualWrite,
    reads: FallbackRead,
    events: Arc<StoreEvents>,
    topics: ExpiringCache<Vec<Topic>>,
    topic_by_slug: ExpiringCache<Topic>,
}

impl DualDatabase {
    /// Builds the orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Primary selection, dual-write flag and cache TTL
    /// * `postgres` - The relational store (Backend A)
    /// * `redis` - The document store (Backend B)
    pub fn new(config: StoreConfig, postgres: Arc<dyn Backend>, redis: Arc<dyn Backend>) -> Self {
        let (primary, secondary) = match config.primary {
            BackendKind::Postgres => (postgres, redis),
            BackendKind::Redis => (redis, postgres),
        };

        let events = Arc::new(StoreEvents::new());
        let mirror = config.dual_write.then(|| secondary.clone());
        let ttl = Duration::from_secs(config.cache_ttl_secs);

        tracing::info!(
            primary = primary.name(),
            secondary = secondary.name(),
            dual_write = config.dual_write,
            cache_ttl_secs = config.cache_ttl_secs,
            "Dual-store orchestrator configured"
        );

        Self {
            primary_name: primary.name(),
            secondary_name: secondary.name(),
            writes: DualWrite::new(primary.clone(), mirror, events.clone()),
            reads: FallbackRead::new(primary, secondary, events.clone()),
            events,
            topics: ExpiringCache::new(ttl),
            topic_by_slug: ExpiringCache::new(ttl),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary_name
    }

    pub fn secondary_name(&self) -> &'static str {
        self.secondary_name
    }

    pub fn dual_write_enabled(&self) -> bool {
        self.writes.mirrors()
    }

    pub fn events(&self) -> &StoreEvents {
        &self.events
    }

    /// Drops every cached topic read
    pub fn invalidate_content_cache(&self) {
        self.topics.invalidate_all();
        self.topic_by_slug.invalidate_all();
        tracing::debug!("Content cache invalidated");
    }

    // Auth

    /// Creates an account in the primary store and mirrors it
    ///
    /// # Errors
    ///
    /// - `InvalidRecord` for a malformed email or a weak password
    /// - `Conflict` if the email is already registered
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> StoreResult<AuthUser> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(StoreError::InvalidRecord(format!("invalid email address: {}", email)));
        }
        validate_password_strength(password).map_err(StoreError::InvalidRecord)?;

        let account = NewAccount::new(&email, hash_password(password)?, display_name);
        let account = &account;

        let user = self
            .writes
            .execute("sign_up", move |backend| async move {
                backend.sign_up(account).await
            })
            .await?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// Checks credentials against whichever store holds the account
    ///
    /// An email neither store knows is reported as `InvalidCredentials`, the
    /// same as a wrong password.
    pub async fn sign_in(&self, email: &str, password: &str) -> StoreResult<AuthUser> {
        self.reads
            .execute("sign_in", move |backend| async move {
                backend.sign_in(email, password).await
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => StoreError::InvalidCredentials,
                other => other,
            })
    }

    pub async fn sign_out(&self, user_id: Uuid) -> StoreResult<()> {
        let at = Utc::now();
        self.writes
            .execute("sign_out", move |backend| async move {
                backend.sign_out(user_id, at).await
            })
            .await
    }

    /// Issues a one-hour reset token
    ///
    /// Unknown emails get a ticket too, so callers cannot probe which
    /// addresses are registered; no store keeps a reset for them.
    pub async fn reset_password(&self, email: &str) -> StoreResult<PasswordResetTicket> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(StoreError::InvalidRecord(format!("invalid email address: {}", email)));
        }

        let (token, token_hash) = generate_reset_token();
        let reset = PasswordReset::new(&email, token_hash);
        let reset_ref = &reset;

        self.writes
            .execute("reset_password", move |backend| async move {
                backend.reset_password(reset_ref).await
            })
            .await?;

        Ok(PasswordResetTicket {
            email: reset.email,
            token,
            expires_at: reset.expires_at,
        })
    }

    pub async fn link_github(
        &self,
        user_id: Uuid,
        identity: GithubIdentity,
    ) -> StoreResult<AuthUser> {
        let identity = &identity;
        self.writes
            .execute("link_github", move |backend| async move {
                backend.link_github(user_id, identity).await
            })
            .await
    }

    pub async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<AuthUser>> {
        self.reads
            .execute_optional("get_user", move |backend| async move {
                backend.get_user(user_id).await
            })
            .await
    }

    // Content

    /// All topics ordered by title, cached
    pub async fn get_topics(&self) -> StoreResult<Vec<Topic>> {
        if let Some(topics) = self.topics.get(TOPICS_KEY) {
            return Ok(topics);
        }

        let topics = self
            .reads
            .execute("get_topics", |backend| async move {
                backend.get_topics().await
            })
            .await?;

        self.topics.set(TOPICS_KEY, topics.clone());
        Ok(topics)
    }

    /// Topic by slug, cached when found
    pub async fn get_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>> {
        let key = topic_key(slug);
        if let Some(topic) = self.topic_by_slug.get(&key) {
            return Ok(Some(topic));
        }

        let topic = self
            .reads
            .execute_optional("get_topic_by_slug", move |backend| async move {
                backend.get_topic_by_slug(slug).await
            })
            .await?;

        if let Some(topic) = &topic {
            self.topic_by_slug.set(key, topic.clone());
        }
        Ok(topic)
    }

    pub async fn get_definitions(&self) -> StoreResult<Vec<Definition>> {
        self.reads
            .execute("get_definitions", |backend| async move {
                backend.get_definitions().await
            })
            .await
    }

    pub async fn get_definition(&self, term: &str) -> StoreResult<Option<Definition>> {
        self.reads
            .execute_optional("get_definition", move |backend| async move {
                backend.get_definition(term).await
            })
            .await
    }

    pub async fn get_projects(&self) -> StoreResult<Vec<Project>> {
        self.reads
            .execute("get_projects", |backend| async move {
                backend.get_projects().await
            })
            .await
    }

    pub async fn get_project_by_slug(&self, slug: &str) -> StoreResult<Option<Project>> {
        self.reads
            .execute_optional("get_project_by_slug", move |backend| async move {
                backend.get_project_by_slug(slug).await
            })
            .await
    }

    pub async fn get_quizzes(&self) -> StoreResult<Vec<Quiz>> {
        self.reads
            .execute("get_quizzes", |backend| async move {
                backend.get_quizzes().await
            })
            .await
    }

    pub async fn get_quiz_by_slug(&self, slug: &str) -> StoreResult<Option<Quiz>> {
        self.reads
            .execute_optional("get_quiz_by_slug", move |backend| async move {
                backend.get_quiz_by_slug(slug).await
            })
            .await
    }

    // Activity

    /// Appends a quiz attempt
    ///
    /// # Errors
    ///
    /// `InvalidRecord` if `total_questions` is not positive or `score` is out
    /// of range
    pub async fn save_quiz_result(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        score: i32,
        total_questions: i32,
    ) -> StoreResult<QuizResult> {
        let result = QuizResult::new(user_id, quiz_id, score, total_questions)
            .map_err(StoreError::InvalidRecord)?;
        let result_ref = &result;

        self.writes
            .execute("save_quiz_result", move |backend| async move {
                backend.save_quiz_result(result_ref).await
            })
            .await?;

        Ok(result)
    }

    pub async fn get_quiz_results(&self, user_id: Uuid) -> StoreResult<Vec<QuizResult>> {
        self.reads
            .execute("get_quiz_results", move |backend| async move {
                backend.get_quiz_results(user_id).await
            })
            .await
    }

    pub async fn mark_topic_read(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
    ) -> StoreResult<UserTopicProgress> {
        let progress = UserTopicProgress::new(user_id, topic_id);
        let progress_ref = &progress;

        self.writes
            .execute("mark_topic_read", move |backend| async move {
                backend.mark_topic_read(progress_ref).await
            })
            .await?;

        Ok(progress)
    }

    pub async fn get_topic_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserTopicProgress>> {
        self.reads
            .execute("get_topic_progress", move |backend| async move {
                backend.get_topic_progress(user_id).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Collection, DocumentBackend, MemoryStore};
    use serde_json::json;

    fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
        (
            Arc::new(MemoryStore::named("postgres")),
            Arc::new(MemoryStore::named("redis")),
        )
    }

    fn backend(store: &Arc<MemoryStore>) -> Arc<dyn Backend> {
        Arc::new(DocumentBackend::new(store.clone()))
    }

    fn topic(slug: &str, title: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "title": title,
            "slug": slug,
            "description": "",
            "content": "",
            "level": "junior",
            "estimated_time": 5,
            "created_at": "2024-03-01T00:00:00Z",
            "updated_at": "2024-03-01T00:00:00Z"
        })
    }

    #[test]
    fn test_topic_key() {
        assert_eq!(topic_key("flutter-basics"), "topic:flutter-basics");
    }

    #[tokio::test]
    async fn test_primary_selection() {
        let (pg, redis) = stores();
        let config = StoreConfig {
            primary: BackendKind::Redis,
            dual_write: false,
            ..StoreConfig::default()
        };

        let db = DualDatabase::new(config, backend(&pg), backend(&redis));
        assert_eq!(db.primary_name(), "redis");
        assert_eq!(db.secondary_name(), "postgres");
        assert!(!db.dual_write_enabled());
    }

    #[tokio::test]
    async fn test_dual_write_disabled_skips_mirror() {
        let (pg, redis) = stores();
        let config = StoreConfig {
            dual_write: false,
            ..StoreConfig::default()
        };
        let db = DualDatabase::new(config, backend(&pg), backend(&redis));

        db.mark_topic_read(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();

        assert_eq!(pg.count(Collection::TopicProgress), 1);
        assert_eq!(redis.calls(), 0);
    }

    #[tokio::test]
    async fn test_topics_are_cached() {
        let (pg, redis) = stores();
        pg.insert(Collection::Topics, "1", topic("widgets", "Widgets"));
        let db = DualDatabase::new(StoreConfig::default(), backend(&pg), backend(&redis));

        assert_eq!(db.get_topics().await.unwrap().len(), 1);
        let calls = pg.calls();

        assert_eq!(db.get_topics().await.unwrap().len(), 1);
        assert_eq!(pg.calls(), calls);

        db.invalidate_content_cache();
        db.get_topics().await.unwrap();
        assert_eq!(pg.calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_missing_topic_is_not_cached() {
        let (pg, redis) = stores();
        let db = DualDatabase::new(StoreConfig::default(), backend(&pg), backend(&redis));

        assert!(db.get_topic_by_slug("dart-basics").await.unwrap().is_none());

        pg.insert(Collection::Topics, "1", topic("dart-basics", "Dart Basics"));
        let found = db.get_topic_by_slug("dart-basics").await.unwrap();
        assert_eq!(found.unwrap().title, "Dart Basics");
    }
}
