//! # Auth Gateway
//!
//! The façade the HTTP handlers talk to. It owns the user directory, the
//! ceremony engine and the token issuer, all injected at construction, and
//! turns ceremony outcomes into tokens or structured errors.

use crate::error::{AppError, AppResult};
use crate::models::{Credential, User};
use crate::store::UserDirectory;
use crate::token::TokenIssuer;
use crate::webauthn::types::{CeremonyOptions, CredentialResponse};
use crate::webauthn::CeremonyEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
}

pub struct AuthGateway {
    users: Arc<dyn UserDirectory>,
    engine: CeremonyEngine,
    tokens: TokenIssuer,
}

impl AuthGateway {
    pub fn new(users: Arc<dyn UserDirectory>, engine: CeremonyEngine, tokens: TokenIssuer) -> Self {
        Self {
            users,
            engine,
            tokens,
        }
    }

    /// Provision a user account
    ///
    /// Emails are trimmed and lower-cased so lookups are case-insensitive.
    pub async fn register(&self, email: &str, display_name: &str) -> AppResult<User> {
        let email = normalize_email(email)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::BadRequest("Display name must not be empty".into()));
        }

        let user = self.users.create_user(&email, display_name).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn begin_registration(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
    ) -> AppResult<CeremonyOptions> {
        self.engine
            .begin_registration(user_id, email, display_name)
            .await
    }

    pub async fn complete_registration(
        &self,
        user_id: &str,
        challenge_id: &str,
        credential: &CredentialResponse,
    ) -> AppResult<Credential> {
        self.engine
            .complete_registration(user_id, challenge_id, credential)
            .await
    }

    pub async fn begin_authentication(&self, email: &str) -> AppResult<CeremonyOptions> {
        let email = normalize_email(email)?;
        self.engine.begin_authentication(&email).await
    }

    /// Complete authentication and mint an access token for the user
    pub async fn complete_authentication(
        &self,
        email: &str,
        challenge_id: &str,
        credential: &CredentialResponse,
    ) -> AppResult<LoginResponse> {
        let email = normalize_email(email)?;
        let user = self
            .engine
            .complete_authentication(&email, challenge_id, credential)
            .await?;

        Ok(LoginResponse {
            access_token: self.tokens.mint(&user.id)?,
            token_type: "bearer".to_string(),
            user_id: user.id,
        })
    }

    /// Resolve a bearer token to the user it was issued for
    ///
    /// Every failure (bad token, expired token, deleted user) collapses to
    /// `Unauthenticated`; the precise reason is only logged.
    pub async fn current_identity(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(kind = e.kind(), "bearer token rejected");
            AppError::Unauthenticated
        })?;

        match self.users.get_user(&claims.sub).await {
            Ok(user) => Ok(user),
            Err(AppError::UserNotFound) => {
                tracing::debug!(user_id = %claims.sub, "token subject no longer exists");
                Err(AppError::Unauthenticated)
            }
            Err(e) => Err(e),
        }
    }
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::BadRequest("Invalid email format".into())),
    }
}
