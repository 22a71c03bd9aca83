//! # Middleware
//!
//! - `auth`: resolves the bearer token to a user before protected handlers run

pub mod auth;
