//! Authentication primitives
//!
//! - [`password`]: Argon2id hashing, strength rules, reset tokens
//! - [`jwt`]: HS256 session tokens
//!
//! Both stores persist the same password hash; this module is the only place
//! that hashes or verifies.

pub mod jwt;
pub mod password;
