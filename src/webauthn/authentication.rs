use super::types::{CeremonyOptions, CredentialResponse};
use super::verifier::decode_base64url;
use super::{log_ceremony_failure, CeremonyEngine};
use crate::error::{AppError, AppResult};
use crate::models::{Challenge, ChallengePurpose, User};

impl CeremonyEngine {
    /// Start passkey authentication for the account behind `email`
    ///
    /// Unknown emails and accounts without credentials both fail with
    /// `UserNotFound` before any challenge is issued.
    pub async fn begin_authentication(&self, email: &str) -> AppResult<CeremonyOptions> {
        let user = self.users.get_user_by_email(email).await?;
        let credentials = self.credentials.list_by_user(&user.id).await?;

        if credentials.is_empty() {
            tracing::debug!(user_id = %user.id, "authentication requested without passkeys");
            return Err(AppError::UserNotFound);
        }

        let start = self.verifier.start_authentication(&credentials)?;

        let challenge = self
            .challenges
            .issue_seeded(ChallengePurpose::Authentication, &user.id, start.seed)
            .await?;

        tracing::info!(user_id = %user.id, challenge_id = %challenge.id, "authentication started");

        Ok(CeremonyOptions {
            challenge_id: challenge.id,
            options: start.options,
        })
    }

    /// Finish passkey authentication and return the authenticated user
    ///
    /// The challenge is taken before anything else, so two concurrent
    /// completions of the same assertion cannot both get past this point.
    /// The credential store is only written when every check has passed, and
    /// then only through its compare-and-swap counter update.
    pub async fn complete_authentication(
        &self,
        email: &str,
        challenge_id: &str,
        response: &CredentialResponse,
    ) -> AppResult<User> {
        let result = match self.challenges.take(challenge_id).await {
            Ok(challenge) => self.finish_authentication(email, &challenge, response).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(user) => tracing::info!(
                user_id = %user.id,
                credential_id = response.id().unwrap_or_default(),
                "passkey authentication succeeded"
            ),
            Err(e) => log_ceremony_failure("authentication", email, e),
        }
        result
    }

    async fn finish_authentication(
        &self,
        email: &str,
        challenge: &Challenge,
        response: &CredentialResponse,
    ) -> AppResult<User> {
        let user = self.users.get_user_by_email(email).await?;

        if challenge.purpose != ChallengePurpose::Authentication || challenge.user_ref != user.id {
            return Err(AppError::ChallengeMismatch);
        }

        let credential_id = response
            .id()
            .ok_or_else(|| AppError::VerificationFailed("credential id missing".into()))?;

        // Fail closed: a credential owned by someone else is treated as absent
        let credential = self.credentials.get_by_id(credential_id).await?;
        if credential.user_id != user.id {
            tracing::warn!(
                target: "security",
                credential_id = %credential.credential_id,
                "credential presented for another account"
            );
            return Err(AppError::CredentialNotFound);
        }

        if let Some(handle) = response.user_handle() {
            if decode_base64url(handle).as_deref() != Some(user.handle().as_slice()) {
                return Err(AppError::VerificationFailed(
                    "user handle does not match account".into(),
                ));
            }
        }

        let outcome = self
            .verifier
            .verify_assertion(challenge, response, &credential)?;

        if outcome.credential_id != credential.credential_id {
            return Err(AppError::VerificationFailed(
                "assertion signed by a different credential".into(),
            ));
        }

        if outcome.counter <= credential.signature_counter {
            return Err(AppError::CounterRegression {
                stored: credential.signature_counter,
                reported: outcome.counter,
            });
        }

        self.credentials
            .update_counter(&credential.credential_id, outcome.counter)
            .await?;

        tracing::debug!(
            credential_id = %credential.credential_id,
            counter = outcome.counter,
            user_verified = outcome.user_verified,
            "assertion accepted"
        );
        Ok(user)
    }
}
