//! # Application State
//!
//! Shared state handed to every request handler. All services are built once
//! here and injected into the gateway; nothing is a hidden global.

use crate::config::Config;
use crate::db::{self, SqliteChallengeStore, SqliteCredentialStore, SqliteUserDirectory};
use crate::error::AppResult;
use crate::gateway::AuthGateway;
use crate::store::{
    ChallengeStore, CredentialStore, MemoryChallengeStore, MemoryCredentialStore,
    MemoryUserDirectory, UserDirectory,
};
use crate::token::TokenIssuer;
use crate::webauthn::verifier::{CredentialVerifier, WebauthnVerifier};
use crate::webauthn::CeremonyEngine;
use std::sync::Arc;

/// Shared application state
///
/// Cloning is cheap: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AuthGateway>,
    /// Kept separately so the background sweep can reach it
    pub challenges: Arc<dyn ChallengeStore>,
}

/// The three stores the gateway runs on
pub struct Stores {
    pub challenges: Arc<dyn ChallengeStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl Stores {
    pub fn in_memory(config: &Config) -> Self {
        Self {
            challenges: Arc::new(MemoryChallengeStore::new(config.challenge_ttl())),
            credentials: Arc::new(MemoryCredentialStore::new()),
            users: Arc::new(MemoryUserDirectory::new()),
        }
    }

    pub async fn sqlite(config: &Config, database_url: &str) -> AppResult<Self> {
        let pool = db::connect(database_url).await?;
        Ok(Self {
            challenges: Arc::new(SqliteChallengeStore::new(pool.clone(), config.challenge_ttl())),
            credentials: Arc::new(SqliteCredentialStore::new(pool.clone())),
            users: Arc::new(SqliteUserDirectory::new(pool)),
        })
    }
}

impl AppState {
    /// Initialize application state from configuration
    ///
    /// Picks the SQLite backend when `DATABASE_URL` is set and the in-memory
    /// backend otherwise.
    ///
    /// # Errors
    /// - Database connection or migration failure
    /// - Empty token secret
    /// - Relying party origin not valid for the RP ID
    pub async fn new(config: &Config) -> AppResult<Self> {
        let stores = match &config.database_url {
            Some(url) => {
                tracing::info!("Using SQLite stores");
                Stores::sqlite(config, url).await?
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                Stores::in_memory(config)
            }
        };

        let verifier = Arc::new(WebauthnVerifier::new(
            &config.relying_party,
            std::time::Duration::from_secs(config.challenge_ttl_seconds),
        )?);
        Self::from_parts(config, stores, verifier)
    }

    /// Assemble state from explicit stores and verifier
    pub fn from_parts(
        config: &Config,
        stores: Stores,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> AppResult<Self> {
        let tokens = TokenIssuer::new(&config.token_secret, config.token_ttl())?;

        let engine = CeremonyEngine::new(
            stores.challenges.clone(),
            stores.credentials,
            stores.users.clone(),
            verifier,
        );

        Ok(AppState {
            gateway: Arc::new(AuthGateway::new(stores.users, engine, tokens)),
            challenges: stores.challenges,
        })
    }
}
