//! In-process document store
//!
//! Used by tests and local runs without Postgres or Redis. Faults can be
//! injected per store, per collection listing, or per commit, and every call
//! is counted so tests can assert a store was never touched.
//!
//! # Example
//!
//! ```
//! use devprep_store::backends::{Collection, DocumentStore, MemoryStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::named("firebase");
//! store.insert(Collection::Topics, "t1", json!({"slug": "flutter-basics"}));
//!
//! let found = store.find_one(Collection::Topics, "slug", "flutter-basics").await.unwrap();
//! assert!(found.is_some());
//!
//! store.set_unavailable(true);
//! assert!(store.list(Collection::Topics).await.is_err());
//! # }
//! ```

use super::backend_trait::{StoreError, StoreResult};
use super::document::{field_matches, Collection, Document, DocumentStore, WriteBatch};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    commits: bool,
    lists: HashSet<Collection>,
}

/// Document store held in memory
pub struct MemoryStore {
    name: &'static str,
    collections: Mutex<HashMap<Collection, BTreeMap<String, Document>>>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Store reporting `name` in logs and errors
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            collections: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            calls: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        }
    }

    /// Seeds a document directly, bypassing fault injection and counters
    pub fn insert(&self, collection: Collection, id: impl Into<String>, document: JsonValue) {
        let document = match document {
            JsonValue::Object(map) => map,
            other => {
                let mut map = Document::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        lock(&self.collections)
            .entry(collection)
            .or_default()
            .insert(id.into(), document);
    }

    /// Snapshot of a collection, ordered by id
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        lock(&self.collections)
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, collection: Collection) -> usize {
        lock(&self.collections)
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Every call fails with `Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.faults).unavailable = unavailable;
    }

    /// Commits fail while set
    pub fn fail_commits(&self, fail: bool) {
        lock(&self.faults).commits = fail;
    }

    /// Listing `collection` fails
    pub fn fail_list(&self, collection: Collection) {
        lock(&self.faults).lists.insert(collection);
    }

    /// Calls made through the [`DocumentStore`] trait, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successful commits
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if lock(&self.faults).unavailable {
            return Err(self.unavailable("network error"));
        }
        Ok(())
    }

    fn unavailable(&self, message: &str) -> StoreError {
        StoreError::Unavailable {
            backend: self.name,
            message: message.to_string(),
        }
    }

    fn filter(&self, collection: Collection, field: &str, value: &str) -> Vec<Document> {
        lock(&self.collections)
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| field_matches(doc, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.enter()?;

        if lock(&self.faults).lists.contains(&collection) {
            return Err(self.unavailable(&format!("listing {} failed", collection)));
        }

        Ok(self.documents(collection))
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        self.enter()?;

        Ok(lock(&self.collections)
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        self.enter()?;
        Ok(self.filter(collection, field, value).into_iter().next())
    }

    async fn find_all(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        self.enter()?;
        Ok(self.filter(collection, field, value))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.enter()?;

        if lock(&self.faults).commits {
            return Err(self.unavailable("batch commit rejected"));
        }

        let mut collections = lock(&self.collections);
        for write in batch.into_writes() {
            collections
                .entry(write.collection)
                .or_default()
                .insert(write.id, write.document);
        }
        drop(collections);

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_commit_and_lookup() {
        let store = MemoryStore::named("memory-test");

        let mut batch = WriteBatch::new();
        for (id, slug) in [("a", "dart-basics"), ("b", "widgets")] {
            let mut doc = Document::new();
            doc.insert("slug".into(), json!(slug));
            batch.set(Collection::Topics, id, doc).unwrap();
        }
        store.commit(batch).await.unwrap();

        assert_eq!(store.count(Collection::Topics), 2);
        assert_eq!(store.commits(), 1);

        let found = store.find_one(Collection::Topics, "slug", "widgets").await.unwrap();
        assert_eq!(found.unwrap()["slug"], "widgets");

        assert!(store.get(Collection::Topics, "a").await.unwrap().is_some());
        assert!(store.get(Collection::Topics, "zzz").await.unwrap().is_none());
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.insert(Collection::Quizzes, "q", json!({"slug": "state"}));

        store.fail_list(Collection::Quizzes);
        assert!(store.list(Collection::Quizzes).await.is_err());
        assert!(store.list(Collection::Topics).await.is_ok());

        store.fail_commits(true);
        assert!(store.commit(WriteBatch::new()).await.is_err());
        assert_eq!(store.commits(), 0);

        store.set_unavailable(true);
        let err = store.get(Collection::Quizzes, "q").await.unwrap_err();
        assert_eq!(err.to_string(), "memory unavailable: network error");
    }

    #[tokio::test]
    async fn test_find_all_filters_by_field() {
        let store = MemoryStore::new();
        store.insert(Collection::QuizQuestions, "1", json!({"quiz_id": "x", "position": 1}));
        store.insert(Collection::QuizQuestions, "2", json!({"quiz_id": "y", "position": 2}));
        store.insert(Collection::QuizQuestions, "3", json!({"quiz_id": "x", "position": 3}));

        let found = store.find_all(Collection::QuizQuestions, "quiz_id", "x").await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
