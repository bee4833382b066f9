//! Shared fixtures for store integration tests
//!
//! Both stores are in-memory document stores named after the real ones, so
//! fault injection and call counters are available on either side.

#![allow(dead_code)]

use devprep_shared::config::{BackendKind, StoreConfig};
use devprep_store::backends::{Backend, Collection, DocumentBackend, MemoryStore};
use devprep_store::orchestrator::DualDatabase;
use serde_json::{json, Value as JsonValue};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

/// Orchestrator over two memory stores
pub struct TestStores {
    pub postgres: Arc<MemoryStore>,
    pub redis: Arc<MemoryStore>,
    pub db: DualDatabase,
}

impl TestStores {
    /// Postgres primary, dual-write on
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_primary(primary: BackendKind) -> Self {
        Self::with_config(StoreConfig {
            primary,
            ..StoreConfig::default()
        })
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let postgres = Arc::new(MemoryStore::named("postgres"));
        let redis = Arc::new(MemoryStore::named("redis"));

        let db = DualDatabase::new(config, backend(&postgres), backend(&redis));

        Self {
            postgres,
            redis,
            db,
        }
    }
}

pub fn backend(store: &Arc<MemoryStore>) -> Arc<dyn Backend> {
    Arc::new(DocumentBackend::new(store.clone()))
}

pub fn topic(slug: &str, title: &str) -> JsonValue {
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

pub fn quiz(id: Uuid, slug: &str, title: &str) -> JsonValue {
    json!({
        "id": id.to_string(),
        "slug": slug,
        "title": title,
        "description": "",
        "level": "middle",
        "created_at": "2024-03-01T09:00:00Z",
        "updated_at": "2024-03-01T09:00:00Z"
    })
}

/// Question as Postgres stores it: options as JSON text
pub fn question(quiz_id: Uuid, position: i64, options: &str) -> JsonValue {
    json!({
        "id": Uuid::new_v4().to_string(),
        "quiz_id": quiz_id.to_string(),
        "question": format!("Question {}", position),
        "options": options,
        "correct_answer": "a",
        "explanation": "",
        "category": "widgets",
        "position": position
    })
}

/// Seeds a topic in a store, returning its id
pub fn seed_topic(store: &MemoryStore, slug: &str, title: &str) -> Uuid {
    let value = topic(slug, title);
    let id = value["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()).unwrap();
    store.insert(Collection::Topics, id.to_string(), value);
    id
}

/// Collects formatted log output so tests can assert on it
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Routes this thread's logs into the buffer until the guard drops
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
