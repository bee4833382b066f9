//! Redis connectivity for the document store
//!
//! Key layout (all under the configured namespace):
//!
//! ```text
//! {ns}:{collection}               HASH  id    -> JSON document
//! {ns}:{collection}:by:{field}    HASH  value -> id
//! ```
//!
//! The document store itself lives in `devprep-store`; this module only owns
//! the connection.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
