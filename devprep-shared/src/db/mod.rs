//! PostgreSQL plumbing: connection pool and schema migrations
//!
//! Row mapping for the relational store lives in `devprep-store`.

pub mod migrations;
pub mod pool;
