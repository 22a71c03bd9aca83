//! # WebAuthn Module
//!
//! The ceremony engine and everything it needs to talk WebAuthn.
//!
//! ## Submodules
//! - `types`: options, credentials and API request bodies
//! - `verifier`: the `webauthn-rs` adapter behind [`verifier::CredentialVerifier`]
//! - `registration`: creating new passkey credentials
//! - `authentication`: logging in with existing passkeys
//!
//! ## Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. `begin_registration` asks the verifier for creation options and issues
//!    a registration challenge carrying the verifier's state
//! 2. The authenticator creates a key pair and signs the challenge
//! 3. `complete_registration` takes the challenge, verifies the response and
//!    stores the public key with counter 0
//!
//! ### Authentication (Logging In)
//! 1. `begin_authentication` issues a challenge listing the user's credentials
//! 2. The authenticator signs the challenge with a registered key
//! 3. `complete_authentication` takes the challenge, verifies the signature,
//!    advances the counter and returns the user
//!
//! The challenge is taken (resolved and removed in one step) before anything
//! else happens on *complete*, so every attempt burns it whether it succeeds
//! or not.

pub mod authentication;
pub mod registration;
pub mod types;
pub mod verifier;

use crate::error::AppError;
use crate::store::{ChallengeStore, CredentialStore, UserDirectory};
use std::sync::Arc;
use verifier::CredentialVerifier;

/// Orchestrates both ceremonies over the injected stores and verifier
pub struct CeremonyEngine {
    challenges: Arc<dyn ChallengeStore>,
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserDirectory>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl CeremonyEngine {
    pub fn new(
        challenges: Arc<dyn ChallengeStore>,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            challenges,
            credentials,
            users,
            verifier,
        }
    }
}

/// Log a failed *complete* step
///
/// Counter regressions and verification failures go to the `security` target
/// so they can be alerted on separately from ordinary misses.
fn log_ceremony_failure(ceremony: &'static str, subject: &str, err: &AppError) {
    if err.is_security_event() {
        tracing::warn!(target: "security", ceremony, subject, kind = err.kind(), "{err}");
    } else {
        tracing::info!(ceremony, subject, kind = err.kind(), "ceremony rejected: {err}");
    }
}
