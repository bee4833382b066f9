//! Middleware for the API server
//!
//! - `auth`: JWT and admin token checks
//! - `security`: Security response headers

pub mod auth;
pub mod security;
