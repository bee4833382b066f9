//! Document-level store access
//!
//! [`DocumentStore`] is the untyped view of a store: named collections of
//! JSON documents keyed by id, with lookups by field and atomic batch
//! writes. The migration runner works at this level, and
//! [`DocumentBackend`] builds the typed [`Backend`] operations on top of it
//! for stores that have no query language of their own (Redis, memory).
//!
//! Unique fields (`slug`, `term`, `email`, `token_hash`) are indexed by
//! stores that support it; other lookups scan the collection.

use super::backend_trait::{Backend, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devprep_shared::auth::password::verify_password;
use devprep_shared::config::MAX_BATCH_WRITES;
use devprep_shared::models::user::normalize_email;
use devprep_shared::models::{
    AuthUser, Definition, GithubIdentity, NewAccount, PasswordReset, Project, Quiz, QuizQuestion,
    QuizResult, Topic, UserTopicProgress,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A JSON object as stored
pub type Document = serde_json::Map<String, JsonValue>;

/// Every collection either store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Topics,
    Definitions,
    Projects,
    Quizzes,
    QuizQuestions,
    QuizResults,
    TopicProgress,
    Users,
    PasswordResets,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Topics,
        Collection::Definitions,
        Collection::Projects,
        Collection::Quizzes,
        Collection::QuizQuestions,
        Collection::QuizResults,
        Collection::TopicProgress,
        Collection::Users,
        Collection::PasswordResets,
    ];

    /// Table / key name
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Topics => "topics",
            Collection::Definitions => "definitions",
            Collection::Projects => "projects",
            Collection::Quizzes => "quizzes",
            Collection::QuizQuestions => "quiz_questions",
            Collection::QuizResults => "quiz_results",
            Collection::TopicProgress => "user_topic_progress",
            Collection::Users => "users",
            Collection::PasswordResets => "password_resets",
        }
    }

    /// Fields whose values are unique within the collection
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Topics | Collection::Projects | Collection::Quizzes => &["slug"],
            Collection::Definitions => &["term"],
            Collection::Users => &["email"],
            Collection::PasswordResets => &["token_hash"],
            Collection::QuizQuestions | Collection::QuizResults | Collection::TopicProgress => &[],
        }
    }

    /// Key used to match records across stores
    pub fn natural_key(&self) -> Option<&'static str> {
        match self {
            Collection::Topics | Collection::Projects | Collection::Quizzes => Some("slug"),
            Collection::Definitions => Some("term"),
            _ => None,
        }
    }

    /// Columns forming the document id
    pub fn id_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::TopicProgress => &["user_id", "topic_id"],
            _ => &["id"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single document write
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub collection: Collection,
    pub id: String,
    pub document: Document,
}

/// Writes committed together, all or nothing
///
/// Holds at most [`WriteBatch::MAX_WRITES`] writes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub const MAX_WRITES: usize = MAX_BATCH_WRITES;

    pub fn new() -> Self {
        Self::default()
    }

    /// Batch holding a single write
    pub fn single(collection: Collection, id: impl Into<String>, document: Document) -> Self {
        Self {
            writes: vec![Write {
                collection,
                id: id.into(),
                document,
            }],
        }
    }

    /// Queues a create-or-replace write
    ///
    /// # Errors
    ///
    /// `InvalidRecord` once the batch is full
    pub fn set(
        &mut self,
        collection: Collection,
        id: impl Into<String>,
        document: Document,
    ) -> StoreResult<()> {
        if self.is_full() {
            return Err(StoreError::InvalidRecord(format!(
                "write batch is limited to {} writes",
                Self::MAX_WRITES
            )));
        }

        self.writes.push(Write {
            collection,
            id: id.into(),
            document,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.writes.len() >= Self::MAX_WRITES
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Untyped collection access
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every document in the collection
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    /// First document whose `field` equals `value` (string comparison)
    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>>;

    /// All documents whose `field` equals `value`
    async fn find_all(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>>;

    /// Applies every write atomically
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Whether `document[field]` matches `value` as text
pub fn field_matches(document: &Document, field: &str, value: &str) -> bool {
    match document.get(field) {
        Some(JsonValue::String(s)) => s == value,
        Some(JsonValue::Number(n)) => n.to_string() == value,
        Some(JsonValue::Bool(b)) => b.to_string() == value,
        _ => false,
    }
}

/// Serializes a record into a document
pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(JsonValue::Object(document))?)
}

/// User document: the public profile plus the credentials that never leave
/// the store
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    #[serde(flatten)]
    profile: AuthUser,

    password_hash: String,

    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,

    #[serde(default)]
    signed_out_at: Option<DateTime<Utc>>,
}

/// [`Backend`] on top of any [`DocumentStore`]
pub struct DocumentBackend {
    store: Arc<dyn DocumentStore>,
}

impl DocumentBackend {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn load_user(&self, user_id: Uuid) -> StoreResult<Option<StoredUser>> {
        self.store
            .get(Collection::Users, &user_id.to_string())
            .await?
            .map(from_document)
            .transpose()
    }

    async fn save_user(&self, user: &StoredUser) -> StoreResult<()> {
        let batch = WriteBatch::single(
            Collection::Users,
            user.profile.id.to_string(),
            to_document(user)?,
        );
        self.store.commit(batch).await
    }

    async fn list_as<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<Vec<T>> {
        self.store
            .list(collection)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn find_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<T>> {
        self.store
            .find_one(collection, field, value)
            .await?
            .map(from_document)
            .transpose()
    }

    async fn find_all_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<T>> {
        self.store
            .find_all(collection, field, value)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn put<T: Serialize + Sync>(&self, collection: Collection, id: String, record: &T) -> StoreResult<()> {
        self.store
            .commit(WriteBatch::single(collection, id, to_document(record)?))
            .await
    }
}

#[async_trait]
impl Backend for DocumentBackend {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    async fn sign_up(&self, account: &NewAccount) -> StoreResult<AuthUser> {
        let email = normalize_email(&account.email);

        if self
            .store
            .find_one(Collection::Users, "email", &email)
            .await?
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "an account already exists for {}",
                email
            )));
        }

        let user = StoredUser {
            profile: account.to_user(),
            password_hash: account.password_hash.clone(),
            last_sign_in_at: None,
            signed_out_at: None,
        };
        self.save_user(&user).await?;

        Ok(user.profile)
    }

    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<AuthUser> {
        let Some(mut user) = self
            .find_as::<StoredUser>(Collection::Users, "email", &normalize_email(email))
            .await?
        else {
            return Err(StoreError::not_found("account", normalize_email(email)));
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(StoreError::InvalidCredentials);
        }

        user.last_sign_in_at = Some(Utc::now());
        self.save_user(&user).await?;

        Ok(user.profile)
    }

    async fn sign_out(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut user = self
            .load_user(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", user_id))?;

        user.signed_out_at = Some(at);
        self.save_user(&user).await
    }

    async fn reset_password(&self, reset: &PasswordReset) -> StoreResult<()> {
        let known = self
            .store
            .find_one(Collection::Users, "email", &reset.email)
            .await?
            .is_some();

        if !known {
            tracing::debug!(backend = self.name(), "Password reset for unknown email ignored");
            return Ok(());
        }

        self.put(Collection::PasswordResets, reset.id.to_string(), reset)
            .await
    }

    async fn link_github(&self, user_id: Uuid, identity: &GithubIdentity) -> StoreResult<AuthUser> {
        let mut user = self
            .load_user(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", user_id))?;

        user.profile.github = Some(identity.clone());
        self.save_user(&user).await?;

        Ok(user.profile)
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<AuthUser>> {
        Ok(self.load_user(user_id).await?.map(|user| user.profile))
    }

    async fn get_topics(&self) -> StoreResult<Vec<Topic>> {
        let mut topics: Vec<Topic> = self.list_as(Collection::Topics).await?;
        topics.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(topics)
    }

    async fn get_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>> {
        self.find_as(Collection::Topics, "slug", slug).await
    }

    async fn get_definitions(&self) -> StoreResult<Vec<Definition>> {
        let mut definitions: Vec<Definition> = self.list_as(Collection::Definitions).await?;
        definitions.sort_by(|a, b| a.term.cmp(&b.term));
        Ok(definitions)
    }

    async fn get_definition(&self, term: &str) -> StoreResult<Option<Definition>> {
        self.find_as(Collection::Definitions, "term", term).await
    }

    async fn get_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.list_as(Collection::Projects).await?;
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn get_project_by_slug(&self, slug: &str) -> StoreResult<Option<Project>> {
        self.find_as(Collection::Projects, "slug", slug).await
    }

    async fn get_quizzes(&self) -> StoreResult<Vec<Quiz>> {
        let mut quizzes: Vec<Quiz> = self.list_as(Collection::Quizzes).await?;
        for quiz in &mut quizzes {
            quiz.questions.clear();
        }
        quizzes.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(quizzes)
    }

    async fn get_quiz_by_slug(&self, slug: &str) -> StoreResult<Option<Quiz>> {
        let Some(mut quiz) = self.find_as::<Quiz>(Collection::Quizzes, "slug", slug).await? else {
            return Ok(None);
        };

        let mut questions: Vec<QuizQuestion> = self
            .find_all_as(Collection::QuizQuestions, "quiz_id", &quiz.id.to_string())
            .await?;
        questions.sort_by_key(|q| q.position);
        quiz.questions = questions;

        Ok(Some(quiz))
    }

    async fn save_quiz_result(&self, result: &QuizResult) -> StoreResult<()> {
        self.put(Collection::QuizResults, result.id.to_string(), result)
            .await
    }

    async fn get_quiz_results(&self, user_id: Uuid) -> StoreResult<Vec<QuizResult>> {
        let mut results: Vec<QuizResult> = self
            .find_all_as(Collection::QuizResults, "user_id", &user_id.to_string())
            .await?;
        results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(results)
    }

    async fn mark_topic_read(&self, progress: &UserTopicProgress) -> StoreResult<()> {
        self.put(Collection::TopicProgress, progress.document_id(), progress)
            .await
    }

    async fn get_topic_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserTopicProgress>> {
        let mut progress: Vec<UserTopicProgress> = self
            .find_all_as(Collection::TopicProgress, "user_id", &user_id.to_string())
            .await?;
        progress.sort_by(|a, b| b.read_at.cmp(&a.read_at));
        Ok(progress)
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
    fn test_collection_keys() {
        assert_eq!(Collection::Topics.natural_key(), Some("slug"));
        assert_eq!(Collection::Definitions.natural_key(), Some("term"));
        assert_eq!(Collection::QuizQuestions.natural_key(), None);
        assert_eq!(Collection::TopicProgress.id_fields(), &["user_id", "topic_id"]);
        assert_eq!(Collection::TopicProgress.name(), "user_topic_progress");
    }

    #[test]
    fn test_write_batch_limit() {
        let mut batch = WriteBatch::new();
        for i in 0..WriteBatch::MAX_WRITES {
            batch.set(Collection::Topics, i.to_string(), Document::new()).unwrap();
        }

        assert!(batch.is_full());
        assert!(matches!(
            batch.set(Collection::Topics, "overflow", Document::new()),
            Err(StoreError::InvalidRecord(_))
        ));
        assert_eq!(batch.len(), 500);
    }

    #[test]
    fn test_field_matches() {
        let document = doc(json!({"slug": "dart-basics", "position": 3, "required": true}));

        assert!(field_matches(&document, "slug", "dart-basics"));
        assert!(!field_matches(&document, "slug", "dart"));
        assert!(field_matches(&document, "position", "3"));
        assert!(field_matches(&document, "required", "true"));
        assert!(!field_matches(&document, "missing", ""));
    }

    #[test]
    fn test_stored_user_keeps_profile_flat() {
        let account = NewAccount::new("dev@example.com", "hash".to_string(), None);
        let stored = StoredUser {
            profile: account.to_user(),
            password_hash: account.password_hash.clone(),
            last_sign_in_at: None,
            signed_out_at: None,
        };

        let document = to_document(&stored).unwrap();
        assert_eq!(document["email"], "dev@example.com");
        assert_eq!(document["password_hash"], "hash");

        let back: StoredUser = from_document(document.clone()).unwrap();
        assert_eq!(back.profile, stored.profile);

        let profile: AuthUser = from_document(document).unwrap();
        assert_eq!(profile.id, account.id);
    }
}
