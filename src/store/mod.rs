//! # Store Capabilities
//!
//! The ceremony engine only sees these traits. Two backends implement them:
//! - [`memory`]: `DashMap`-backed, per-key locking, used by default and in tests
//! - [`crate::db`]: SQLite through SQLx, for durable deployments
//!
//! ## Atomicity
//! - [`ChallengeStore::take`] must resolve and consume as one step. Two
//!   callers racing on the same id must never both receive the challenge.
//! - [`CredentialStore::update_counter`] must compare and set as one step.
//!   Two callers reporting the same counter must never both succeed.

use crate::error::AppResult;
use crate::models::{Challenge, ChallengePurpose, ChallengeSeed, Credential, User};
use async_trait::async_trait;

pub mod memory;

pub use memory::{MemoryChallengeStore, MemoryCredentialStore, MemoryUserDirectory};

/// Ephemeral, one-time, TTL-bound challenges
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Generate, record and return a fresh random challenge
    async fn issue(&self, purpose: ChallengePurpose, user_ref: &str) -> AppResult<Challenge> {
        self.issue_seeded(purpose, user_ref, ChallengeSeed::random())
            .await
    }

    /// Record and return a challenge built from verifier-produced material
    async fn issue_seeded(
        &self,
        purpose: ChallengePurpose,
        user_ref: &str,
        seed: ChallengeSeed,
    ) -> AppResult<Challenge>;

    /// Look up a live challenge without consuming it
    ///
    /// An expired entry is purged and reported as `ChallengeExpired`; later
    /// lookups of the same id see `ChallengeNotFound`.
    async fn resolve(&self, challenge_id: &str) -> AppResult<Challenge>;

    /// Remove a challenge. Unconditional and idempotent.
    async fn consume(&self, challenge_id: &str) -> AppResult<()>;

    /// Resolve and consume in one linearizable step
    ///
    /// The entry is gone after this call whether it succeeded, expired, or
    /// was never there.
    async fn take(&self, challenge_id: &str) -> AppResult<Challenge>;

    /// Drop every expired challenge, returning how many were removed
    async fn purge_expired(&self) -> AppResult<u64>;
}

/// Durable per-user public-key credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new credential; `DuplicateCredential` if the id is taken
    async fn save(&self, credential: &Credential) -> AppResult<()>;

    async fn get_by_id(&self, credential_id: &str) -> AppResult<Credential>;

    /// All credentials owned by `user_id`, oldest first
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Credential>>;

    /// Compare-and-swap the signature counter
    ///
    /// Fails with `CounterRegression` unless `new_counter` is strictly greater
    /// than the stored value, and with `CredentialNotFound` for unknown ids.
    async fn update_counter(&self, credential_id: &str, new_counter: u32) -> AppResult<()>;
}

/// External user directory consumed by the gateway and the engine
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a user; `UserAlreadyExists` if the email is taken
    async fn create_user(&self, email: &str, display_name: &str) -> AppResult<User>;

    async fn get_user(&self, user_id: &str) -> AppResult<User>;

    async fn get_user_by_email(&self, email: &str) -> AppResult<User>;
}
