//! PostgreSQL store (Backend A)
//!
//! Implements [`Backend`] with typed queries against the schema in
//! `devprep-shared/migrations`, and [`DocumentStore`] by converting rows to
//! and from JSONB (`to_jsonb` / `jsonb_populate_record`) so the migration
//! runner can read and write it like any other document store.
//!
//! Table and column names in dynamic SQL only ever come from [`Collection`]
//! or from document keys that pass [`is_identifier`].

use super::backend_trait::{Backend, StoreError, StoreResult};
use super::document::{Collection, Document, DocumentStore, WriteBatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devprep_shared::auth::password::verify_password;
use devprep_shared::models::quiz::parse_options;
use devprep_shared::models::user::normalize_email;
use devprep_shared::models::{
    normalize_nested, AuthUser, Definition, GithubIdentity, Level, NewAccount, PasswordReset,
    Project, Quiz, QuizQuestion, QuizResult, Topic, TopicContent, UserTopicProgress,
};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, email_verified, password_hash, display_name, \
    github_username, github_avatar_url, github_access_token, created_at";

const TOPIC_COLUMNS: &str =
    "id, title, slug, description, content, level, estimated_time, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, name, slug, description, difficulty, category, github_url, \
    demo_url, technologies, features, created_at, updated_at";

const QUIZ_COLUMNS: &str = "id, slug, title, description, level, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    email_verified: bool,
    password_hash: String,
    display_name: Option<String>,
    github_username: Option<String>,
    github_avatar_url: Option<String>,
    github_access_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for AuthUser {
    fn from(row: UserRow) -> Self {
        let github = row.github_username.map(|username| GithubIdentity {
            username,
            avatar_url: row.github_avatar_url,
            access_token: row.github_access_token,
        });

        AuthUser {
            id: row.id,
            email: row.email,
            email_verified: row.email_verified,
            display_name: row.display_name,
            github,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: Uuid,
    title: String,
    slug: String,
    description: String,
    content: Json<TopicContent>,
    level: Level,
    estimated_time: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            content: row.content.0,
            level: row.level,
            estimated_time: row.estimated_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    difficulty: Level,
    category: String,
    github_url: Option<String>,
    demo_url: Option<String>,
    technologies: Json<JsonValue>,
    features: Json<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            difficulty: row.difficulty,
            category: row.category,
            github_url: row.github_url,
            demo_url: row.demo_url,
            technologies: normalize_nested(row.technologies.0)?,
            features: normalize_nested(row.features.0)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    level: Level,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            level: row.level,
            questions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    question: String,
    options: String,
    correct_answer: String,
    explanation: String,
    category: String,
    position: i32,
}

impl From<QuestionRow> for QuizQuestion {
    fn from(row: QuestionRow) -> Self {
        QuizQuestion {
            id: row.id,
            quiz_id: row.quiz_id,
            question: row.question,
            options: parse_options(&JsonValue::String(row.options)),
            correct_answer: row.correct_answer,
            explanation: row.explanation,
            category: row.category,
            position: row.position,
        }
    }
}

/// Relational store over a shared pool
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// Maps unique violations to `Conflict`
fn map_insert_error(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{} already exists", what))
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn sign_up(&self, account: &NewAccount) -> StoreResult<AuthUser> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(account.id)
            .bind(normalize_email(&account.email))
            .bind(&account.password_hash)
            .bind(&account.display_name)
            .bind(account.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, "an account for this email"))?;

        Ok(row.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<AuthUser> {
        let Some(row) = self.find_user_by_email(&normalize_email(email)).await? else {
            return Err(StoreError::not_found("account", normalize_email(email)));
        };

        if !verify_password(password, &row.password_hash)? {
            return Err(StoreError::InvalidCredentials);
        }

        sqlx::query("UPDATE users SET last_sign_in_at = NOW() WHERE id = $1")
            .bind(row.id)
            .execute(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn sign_out(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE users SET signed_out_at = $2, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .bind(at)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn reset_password(&self, reset: &PasswordReset) -> StoreResult<()> {
        // Unknown emails insert nothing
        sqlx::query(
            r#"
            INSERT INTO password_resets (id, email, token_hash, expires_at, created_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM users WHERE email = $2)
            "#,
        )
        .bind(reset.id)
        .bind(&reset.email)
        .bind(&reset.token_hash)
        .bind(reset.expires_at)
        .bind(reset.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn link_github(&self, user_id: Uuid, identity: &GithubIdentity) -> StoreResult<AuthUser> {
        let sql = format!(
            r#"
            UPDATE users
            SET github_username = $2,
                github_avatar_url = $3,
                github_access_token = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(&identity.username)
            .bind(&identity.avatar_url)
            .bind(&identity.access_token)
            .fetch_optional(&self.pool)
            .await?
            .map(AuthUser::from)
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<AuthUser>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(AuthUser::from))
    }

    async fn get_topics(&self) -> StoreResult<Vec<Topic>> {
        let sql = format!("SELECT {} FROM topics ORDER BY title", TOPIC_COLUMNS);
        let rows = sqlx::query_as::<_, TopicRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Topic::from).collect())
    }

    async fn get_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>> {
        let sql = format!("SELECT {} FROM topics WHERE slug = $1", TOPIC_COLUMNS);
        Ok(sqlx::query_as::<_, TopicRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Topic::from))
    }

    async fn get_definitions(&self) -> StoreResult<Vec<Definition>> {
        Ok(sqlx::query_as::<_, Definition>(
            "SELECT id, term, definition, category, created_at, updated_at FROM definitions ORDER BY term",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_definition(&self, term: &str) -> StoreResult<Option<Definition>> {
        Ok(sqlx::query_as::<_, Definition>(
            "SELECT id, term, definition, category, created_at, updated_at FROM definitions WHERE term = $1",
        )
        .bind(term)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_projects(&self) -> StoreResult<Vec<Project>> {
        let sql = format!("SELECT {} FROM projects ORDER BY name", PROJECT_COLUMNS);
        sqlx::query_as::<_, ProjectRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect()
    }

    async fn get_project_by_slug(&self, slug: &str) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE slug = $1", PROJECT_COLUMNS);
        sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Project::try_from)
            .transpose()
    }

    async fn get_quizzes(&self) -> StoreResult<Vec<Quiz>> {
        let sql = format!("SELECT {} FROM quizzes ORDER BY title", QUIZ_COLUMNS);
        let rows = sqlx::query_as::<_, QuizRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Quiz::from).collect())
    }

    async fn get_quiz_by_slug(&self, slug: &str) -> StoreResult<Option<Quiz>> {
        let sql = format!("SELECT {} FROM quizzes WHERE slug = $1", QUIZ_COLUMNS);
        let Some(row) = sqlx::query_as::<_, QuizRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut quiz = Quiz::from(row);
        quiz.questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, question, options, correct_answer, explanation, category, position
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(quiz.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(QuizQuestion::from)
        .collect();

        Ok(Some(quiz))
    }

    async fn save_quiz_result(&self, result: &QuizResult) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_results (id, user_id, quiz_id, score, total_questions, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(result.id)
        .bind(result.user_id)
        .bind(result.quiz_id)
        .bind(result.score)
        .bind(result.total_questions)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "quiz result"))?;

        Ok(())
    }

    async fn get_quiz_results(&self, user_id: Uuid) -> StoreResult<Vec<QuizResult>> {
        Ok(sqlx::query_as::<_, QuizResult>(
            r#"
            SELECT id, user_id, quiz_id, score, total_questions, completed_at
            FROM quiz_results
            WHERE user_id = $1
            ORDER BY completed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_topic_read(&self, progress: &UserTopicProgress) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_topic_progress (user_id, topic_id, read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, topic_id) DO UPDATE SET read_at = EXCLUDED.read_at
            "#,
        )
        .bind(progress.user_id)
        .bind(progress.topic_id)
        .bind(progress.read_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_topic_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserTopicProgress>> {
        Ok(sqlx::query_as::<_, UserTopicProgress>(
            "SELECT user_id, topic_id, read_at FROM user_topic_progress WHERE user_id = $1 ORDER BY read_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Lowercase ASCII letters, digits and underscores, not starting with a digit
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn checked_field(field: &str) -> StoreResult<&str> {
    if is_identifier(field) {
        Ok(field)
    } else {
        Err(StoreError::InvalidRecord(format!("invalid field name '{}'", field)))
    }
}

/// SQL expression producing the document id of a row aliased `t`
fn id_expression(collection: Collection) -> String {
    let columns: Vec<String> = collection
        .id_fields()
        .iter()
        .map(|c| format!("t.{}::text", c))
        .collect();
    format!("concat_ws(':', {})", columns.join(", "))
}

/// `INSERT ... jsonb_populate_record ... ON CONFLICT DO UPDATE` for one document
fn upsert_statement(collection: Collection, document: &Document) -> StoreResult<String> {
    let table = collection.name();
    let keys = collection.id_fields();

    let mut assignments = Vec::new();
    for column in document.keys() {
        let column = checked_field(column)?;
        if !keys.contains(&column) {
            assignments.push(format!("{0} = EXCLUDED.{0}", column));
        }
    }

    let on_conflict = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    Ok(format!(
        "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
         ON CONFLICT ({keys}) {on_conflict}",
        table = table,
        keys = keys.join(", "),
        on_conflict = on_conflict,
    ))
}

fn into_documents(values: Vec<JsonValue>) -> StoreResult<Vec<Document>> {
    values
        .into_iter()
        .map(|value| match value {
            JsonValue::Object(map) => Ok(map),
            other => Err(StoreError::InvalidRecord(format!(
                "row did not convert to an object: {}",
                other
            ))),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let sql = format!("SELECT to_jsonb(t) FROM {} t", collection.name());
        let rows: Vec<JsonValue> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        into_documents(rows)
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE {} = $1",
            collection.name(),
            id_expression(collection)
        );
        let row: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(into_documents(row.into_iter().collect())?.into_iter().next())
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{}::text = $1 LIMIT 1",
            collection.name(),
            checked_field(field)?
        );
        let row: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(into_documents(row.into_iter().collect())?.into_iter().next())
    }

    async fn find_all(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{}::text = $1",
            collection.name(),
            checked_field(field)?
        );
        let rows: Vec<JsonValue> = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        into_documents(rows)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let mut tx = self.pool.begin().await?;

        for write in batch.into_writes() {
            let sql = upsert_statement(write.collection, &write.document)?;
            sqlx::query(&sql)
                .bind(JsonValue::Object(write.document))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, &format!("{} {}", write.collection, write.id)))?;
        }

        tx.commit().await?;

        tracing::debug!(writes = count, "Committed Postgres batch");
        Ok(())
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
    fn test_is_identifier() {
        assert!(is_identifier("slug"));
        assert!(is_identifier("estimated_time"));
        assert!(is_identifier("_private2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("slug; DROP TABLE topics"));
        assert!(!is_identifier("Slug"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_upsert_statement() {
        let sql = upsert_statement(
            Collection::Topics,
            &doc(json!({"id": "x", "slug": "a", "title": "A"})),
        )
        .unwrap();

        assert!(sql.starts_with("INSERT INTO topics SELECT * FROM jsonb_populate_record(NULL::topics, $1)"));
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET"));
        assert!(sql.contains("slug = EXCLUDED.slug"));
        assert!(!sql.contains("id = EXCLUDED.id"));
    }

    #[test]
    fn test_upsert_statement_composite_key() {
        let sql = upsert_statement(
            Collection::TopicProgress,
            &doc(json!({"user_id": "u", "topic_id": "t", "read_at": "2024-01-01T00:00:00Z"})),
        )
        .unwrap();

        assert!(sql.contains("ON CONFLICT (user_id, topic_id) DO UPDATE SET read_at = EXCLUDED.read_at"));
    }

    #[test]
    fn test_upsert_statement_rejects_bad_keys() {
        let result = upsert_statement(Collection::Topics, &doc(json!({"id": "x", "bad key": 1})));
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_id_expression() {
        assert_eq!(id_expression(Collection::Topics), "concat_ws(':', t.id::text)");
        assert_eq!(
            id_expression(Collection::TopicProgress),
            "concat_ws(':', t.user_id::text, t.topic_id::text)"
        );
    }

    #[test]
    fn test_question_row_with_malformed_options() {
        let question = QuizQuestion::from(QuestionRow {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            question: "What does setState do?".to_string(),
            options: "{a: broken".to_string(),
            correct_answer: "a".to_string(),
            explanation: String::new(),
            category: "state".to_string(),
            position: 2,
        });

        assert!(question.options.is_empty());
        assert_eq!(question.position, 2);
    }
}
