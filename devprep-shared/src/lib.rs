//! # devprep Shared Library
//!
//! Shared types, configuration and infrastructure clients used by the devprep
//! store layer and API server.
//!
//! ## Module Organization
//!
//! - `models`: Content and activity records (topics, quizzes, projects, users)
//! - `auth`: Password hashing, reset tokens and JWT handling
//! - `cache`: In-process expiring cache for frequently read content
//! - `config`: Store selection and migration configuration
//! - `db`: PostgreSQL pool and schema migrations (Backend A)
//! - `redis`: Redis client (Backend B)

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod redis;

/// Current version of the devprep shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
