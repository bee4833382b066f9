//! Redis document store (Backend B)
//!
//! Each collection is one hash of id → JSON document; unique fields get a
//! companion index hash of value → id:
//!
//! ```text
//! devprep:topics                HSET <uuid> '{"slug":"flutter-basics",...}'
//! devprep:topics:by:slug        HSET flutter-basics <uuid>
//! ```
//!
//! Batches are sent as one `MULTI`/`EXEC` pipeline so they apply all or
//! nothing. Lookups on non-indexed fields scan the collection hash, which is
//! fine for the content sizes this service holds.

use super::backend_trait::{StoreError, StoreResult};
use super::document::{field_matches, Collection, Document, DocumentStore, WriteBatch};
use async_trait::async_trait;
use devprep_shared::redis::RedisClient;
use redis::{AsyncCommands, RedisResult};
use serde_json::Value as JsonValue;
use std::future::Future;

pub struct RedisDocumentStore {
    client: RedisClient,
}

impl RedisDocumentStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn collection_key(&self, collection: Collection) -> String {
        self.client.key(collection.name())
    }

    fn index_key(&self, collection: Collection, field: &str) -> String {
        self.client.key(&index_suffix(collection, field))
    }

    /// Applies the command timeout and maps errors
    async fn timed<T>(&self, command: impl Future<Output = RedisResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.client.command_timeout(), command)
            .await
            .map_err(|_| StoreError::Unavailable {
                backend: "redis",
                message: "command timed out".to_string(),
            })?
            .map_err(StoreError::from)
    }

    async fn get_raw(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let mut conn = self.client.connection();
        let key = self.collection_key(collection);

        let raw: Option<String> = self.timed(conn.hget(&key, id)).await?;
        raw.map(|json| parse_document(&json)).transpose()
    }
}

fn index_suffix(collection: Collection, field: &str) -> String {
    format!("{}:by:{}", collection.name(), field)
}

fn parse_document(json: &str) -> StoreResult<Document> {
    match serde_json::from_str::<JsonValue>(json)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "stored document is not an object: {}",
            other
        ))),
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let mut conn = self.client.connection();
        let key = self.collection_key(collection);

        let values: Vec<String> = self.timed(conn.hvals(&key)).await?;
        values.iter().map(|json| parse_document(json)).collect()
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        self.get_raw(collection, id).await
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        if collection.unique_fields().contains(&field) {
            let mut conn = self.client.connection();
            let index = self.index_key(collection, field);

            let id: Option<String> = self.timed(conn.hget(&index, value)).await?;
            return match id {
                Some(id) => Ok(self
                    .get_raw(collection, &id)
                    .await?
                    .filter(|doc| field_matches(doc, field, value))),
                None => Ok(None),
            };
        }

        Ok(self
            .find_all(collection, field, value)
            .await?
            .into_iter()
            .next())
    }

    async fn find_all(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .filter(|doc| field_matches(doc, field, value))
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();

        let count = batch.len();
        for write in batch.into_writes() {
            for field in write.collection.unique_fields() {
                if let Some(JsonValue::String(value)) = write.document.get(*field) {
                    pipe.hset(self.index_key(write.collection, field), value, &write.id)
                        .ignore();
                }
            }

            let json = serde_json::to_string(&write.document)?;
            pipe.hset(self.collection_key(write.collection), &write.id, json)
                .ignore();
        }

        let mut conn = self.client.connection();
        self.timed(pipe.query_async::<_, ()>(&mut conn)).await?;

        tracing::debug!(writes = count, "Committed Redis batch");
        Ok(())
    }
}
