//! # Passkey Auth Gateway
//!
//! Passwordless authentication over WebAuthn passkeys: single-use challenges,
//! credential storage with signature counters, ceremony verification and
//! short-lived bearer tokens.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;
pub mod store;
pub mod token;
pub mod webauthn;
