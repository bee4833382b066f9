//! API route handlers
//!
//! - `health`: Health check with store divergence counters
//! - `auth`: Sign-up, sign-in, token refresh, password reset, GitHub linking
//! - `content`: Read-only topics, definitions, projects and quizzes
//! - `progress`: Quiz results and topic read markers for the signed-in user
//! - `admin`: Content migration trigger

pub mod admin;
pub mod auth;
pub mod content;
pub mod health;
pub mod progress;
