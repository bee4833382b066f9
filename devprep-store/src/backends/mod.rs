//! Store implementations
//!
//! Two traits describe a store:
//!
//! - [`Backend`]: the typed logical operations the orchestrator calls
//! - [`DocumentStore`]: untyped collection access used by the migration runner
//!
//! # Stores
//!
//! - **Postgres** (Backend A): typed SQL; also a document store via JSONB
//! - **Redis** (Backend B): JSON documents in hashes, wrapped by
//!   [`DocumentBackend`] for the typed operations
//! - **Memory**: in-process document store with fault injection for tests
//!
//! # Example
//!
//! ```ignore
//! use devprep_store::backends::{Backend, DocumentBackend, MemoryStore};
//! use std::sync::Arc;
//!
//! let backend: Arc<dyn Backend> =
//!     Arc::new(DocumentBackend::new(Arc::new(MemoryStore::named("firebase"))));
//! let topics = backend.get_topics().await?;
//! ```

pub mod backend_trait;
pub mod document;
pub mod memory;
pub mod postgres;
pub mod redis_store;

// Re-export main types
pub use backend_trait::{Backend, StoreError, StoreResult};
pub use document::{Collection, Document, DocumentBackend, DocumentStore, Write, WriteBatch};
pub use memory::MemoryStore;
pub use postgres::PostgresBackend;
pub use redis_store::RedisDocumentStore;
