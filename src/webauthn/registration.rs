//! # Passkey Registration Logic
//!
//! Registration is a two-step process: begin and complete.
//!
//! ## Security Concepts
//! - **Challenge**: random value the new key must sign, single use
//! - **Public Key Cryptography**: the server stores the public key, the
//!   private key stays on the device
//! - **Attestation**: checked by the verifier; certificate chains are not
//!   evaluated (`attestation: none`)

use super::types::{CeremonyOptions, CredentialResponse};
use super::{log_ceremony_failure, CeremonyEngine};
use crate::error::{AppError, AppResult};
use crate::models::{Challenge, ChallengePurpose, Credential};

impl CeremonyEngine {
    /// Start the passkey registration process
    ///
    /// Issues a registration challenge bound to `user_id` and returns the
    /// options for `navigator.credentials.create()`. Credentials the user
    /// already holds are listed in `excludeCredentials` so the same
    /// authenticator is not enrolled twice.
    ///
    /// ## Errors
    /// - UserNotFound: no such user in the directory
    pub async fn begin_registration(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
    ) -> AppResult<CeremonyOptions> {
        let user = self.users.get_user(user_id).await?;
        let existing = self.credentials.list_by_user(&user.id).await?;

        let start = self
            .verifier
            .start_registration(&user, email, display_name, &existing)?;

        let challenge = self
            .challenges
            .issue_seeded(ChallengePurpose::Registration, &user.id, start.seed)
            .await?;

        tracing::info!(user_id = %user.id, challenge_id = %challenge.id, "registration started");

        Ok(CeremonyOptions {
            challenge_id: challenge.id,
            options: start.options,
        })
    }

    /// Finish the passkey registration process
    ///
    /// The challenge is consumed first; whatever happens afterwards, it can
    /// not be used again. Nothing is written unless every check passes.
    ///
    /// ## Errors
    /// - ChallengeNotFound / ChallengeExpired: challenge unusable
    /// - ChallengeMismatch: challenge belongs to another user or ceremony
    /// - UserNotFound: user vanished between begin and complete
    /// - VerificationFailed: attestation did not verify
    /// - DuplicateCredential: credential id already registered
    pub async fn complete_registration(
        &self,
        user_id: &str,
        challenge_id: &str,
        response: &CredentialResponse,
    ) -> AppResult<Credential> {
        let result = match self.challenges.take(challenge_id).await {
            Ok(challenge) => self.finish_registration(user_id, &challenge, response).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(credential) => tracing::info!(
                user_id,
                credential_id = %credential.credential_id,
                algorithm = credential.public_key.algorithm,
                "passkey registered"
            ),
            Err(e) => log_ceremony_failure("registration", user_id, e),
        }
        result
    }

    async fn finish_registration(
        &self,
        user_id: &str,
        challenge: &Challenge,
        response: &CredentialResponse,
    ) -> AppResult<Credential> {
        if challenge.purpose != ChallengePurpose::Registration || challenge.user_ref != user_id {
            return Err(AppError::ChallengeMismatch);
        }

        let user = self.users.get_user(user_id).await?;
        let key = self.verifier.verify_attestation(challenge, response)?;

        let credential = Credential::new(key.credential_id, user.id, key.public_key);
        self.credentials.save(&credential).await?;

        Ok(credential)
    }
}
