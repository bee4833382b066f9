//! Common test utilities for API integration tests
//!
//! The router runs over in-memory stores, so no Postgres or Redis is needed:
//! - `TestContext` builds the app with a known JWT secret and admin token
//! - request helpers send JSON and parse JSON responses

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use devprep_api::app::{build_router, AppState};
use devprep_api::config::{ApiConfig, Config, JwtConfig};
use devprep_shared::config::{MigrationConfig, StoreConfig};
use devprep_store::backends::{Collection, DocumentBackend, MemoryStore};
use devprep_store::migration::MigrationRunner;
use devprep_store::DualDatabase;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::Service as _;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const PASSWORD: &str = "Str0ng!Passw0rd";

/// Test context containing the app and the stores behind it
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub postgres: Arc<MemoryStore>,
    pub redis: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_admin_token(Some(ADMIN_TOKEN.to_string()))
    }

    pub fn with_admin_token(admin_token: Option<String>) -> Self {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
            },
            admin_token,
            store: StoreConfig::default(),
            migration: MigrationConfig::default(),
        };

        let postgres = Arc::new(MemoryStore::named("postgres"));
        let redis = Arc::new(MemoryStore::named("redis"));

        let db = DualDatabase::new(
            config.store.clone(),
            Arc::new(DocumentBackend::new(postgres.clone())),
            Arc::new(DocumentBackend::new(redis.clone())),
        );
        let migrator = MigrationRunner::new(postgres.clone(), redis.clone(), config.migration.clone());

        let state = AppState::new(db, migrator, config);
        let app = build_router(state.clone());

        Self {
            app,
            state,
            postgres,
            redis,
        }
    }

    /// Sends a request and returns the status and parsed JSON body
    /// (`Value::Null` for an empty body)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(get(uri, None)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(post(uri, None, body)).await
    }

    /// Signs up a user and returns its id and access token
    pub async fn sign_up(&self, email: &str) -> (Uuid, String) {
        let (status, body) = self
            .post(
                "/v1/auth/sign-up",
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        let token = body["access_token"].as_str().unwrap().to_string();
        (id, token)
    }
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn topic(slug: &str, title: &str) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "title": title,
        "slug": slug,
        "description": format!("All about {}", title),
        "content": format!("# {}", title),
        "level": "junior",
        "estimated_time": 10,
        "created_at": "2024-03-01T09:00:00Z",
        "updated_at": "2024-03-01T09:00:00Z"
    })
}

/// Seeds a topic in a store, returning its id
pub fn seed_topic(store: &MemoryStore, slug: &str, title: &str) -> Uuid {
    let value = topic(slug, title);
    let id: Uuid = value["id"].as_str().unwrap().parse().unwrap();
    store.insert(Collection::Topics, id.to_string(), value);
    id
}

/// Seeds a quiz whose questions have correct answers "a", "b", ..., returning
/// the quiz id and question ids in position order
pub fn seed_quiz(store: &MemoryStore, slug: &str, answers: &[&str]) -> (Uuid, Vec<Uuid>) {
    let quiz_id = Uuid::new_v4();
    store.insert(
        Collection::Quizzes,
        quiz_id.to_string(),
        json!({
            "id": quiz_id.to_string(),
            "slug": slug,
            "title": slug,
            "description": "",
            "level": "middle",
            "created_at": "2024-03-01T09:00:00Z",
            "updated_at": "2024-03-01T09:00:00Z"
        }),
    );

    let mut question_ids = Vec::new();
    for (index, answer) in answers.iter().enumerate() {
        let id = Uuid::new_v4();
        store.insert(
            Collection::QuizQuestions,
            id.to_string(),
            json!({
                "id": id.to_string(),
                "quiz_id": quiz_id.to_string(),
                "question": format!("Question {}", index + 1),
                "options": {"a": "First", "b": "Second", "c": "Third"},
                "correct_answer": answer,
                "explanation": "",
                "category": "widgets",
                "position": index + 1
            }),
        );
        question_ids.push(id);
    }

    (quiz_id, question_ids)
}
