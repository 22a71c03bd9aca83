//! # Credential Verification
//!
//! The ceremony engine only depends on the [`CredentialVerifier`] trait.
//! [`WebauthnVerifier`] is the production implementation, a thin adapter over
//! `webauthn-rs`: it builds the options sent to the browser, keeps the
//! per-ceremony state (`PasskeyRegistration` / `PasskeyAuthentication`) in the
//! challenge it is issued with, and hands the authenticator's response back
//! to `webauthn-rs` for verification.
//!
//! ## What stays with the engine
//! Challenge lookup and consumption, purpose and user binding, credential
//! ownership, the user handle and the signature counter compare-and-swap.
//! The verifier never touches a store.

use crate::config::RelyingParty;
use crate::error::{AppError, AppResult};
use crate::models::{Challenge, ChallengeSeed, Credential, PublicKeyMaterial, User};
use crate::webauthn::types::CredentialResponse;
use base64::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use webauthn_rs::prelude::*;

/// Everything a *begin* step produces: the options for the browser and the
/// material the challenge is issued from
#[derive(Debug, Clone)]
pub struct CeremonyStart {
    /// WebAuthn JSON, `{"publicKey": {...}}`
    pub options: Value,
    pub seed: ChallengeSeed,
}

/// Key accepted by a registration ceremony
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredKey {
    /// base64url without padding
    pub credential_id: String,
    pub public_key: PublicKeyMaterial,
}

/// Result of a successful assertion check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    /// Credential the authenticator actually signed with
    pub credential_id: String,
    /// Signature counter reported by the authenticator
    pub counter: u32,
    pub user_verified: bool,
}

/// External cryptographic verifier consumed by the ceremony engine
///
/// Implementations must be `Send + Sync`; one instance serves every request.
pub trait CredentialVerifier: Send + Sync {
    /// Build creation options for `user`, excluding keys it already holds
    fn start_registration(
        &self,
        user: &User,
        name: &str,
        display_name: &str,
        existing: &[Credential],
    ) -> AppResult<CeremonyStart>;

    /// Verify a registration response against the challenge it answers
    fn verify_attestation(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
    ) -> AppResult<RegisteredKey>;

    /// Build request options allowing any of `credentials`
    fn start_authentication(&self, credentials: &[Credential]) -> AppResult<CeremonyStart>;

    /// Verify an authentication response signed by `credential`
    fn verify_assertion(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
        credential: &Credential,
    ) -> AppResult<AssertionOutcome>;
}

/// `webauthn-rs` backed verifier
///
/// Stored credentials hold the serialized `Passkey`; challenges hold the
/// serialized ceremony state.
pub struct WebauthnVerifier {
    webauthn: Webauthn,
}

impl WebauthnVerifier {
    /// Configure WebAuthn with the relying party identity
    ///
    /// `timeout` is advertised to the browser and should match the challenge
    /// TTL.
    ///
    /// # Errors
    /// `AppError::Configuration` when the origin is not a URL or does not
    /// belong to the RP ID.
    pub fn new(relying_party: &RelyingParty, timeout: Duration) -> AppResult<Self> {
        let origin = Url::parse(&relying_party.origin).map_err(|e| {
            AppError::Configuration(format!("RP_ORIGIN {:?} is not a URL: {e}", relying_party.origin))
        })?;

        let webauthn = WebauthnBuilder::new(&relying_party.id, &origin)
            .map_err(|e| {
                AppError::Configuration(format!(
                    "invalid relying party (id={}, origin={origin}): {e}",
                    relying_party.id
                ))
            })?
            .rp_name(&relying_party.name)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("WebAuthn build error: {e}")))?;

        Ok(Self { webauthn })
    }
}

impl CredentialVerifier for WebauthnVerifier {
    fn start_registration(
        &self,
        user: &User,
        name: &str,
        display_name: &str,
        existing: &[Credential],
    ) -> AppResult<CeremonyStart> {
        let user_uuid = Uuid::from_slice(&user.handle())
            .map_err(|_| AppError::Internal(format!("user id {} is not a UUID", user.id)))?;

        let exclude = existing
            .iter()
            .map(|c| load_passkey(c).map(|passkey| passkey.cred_id().clone()))
            .collect::<AppResult<Vec<CredentialID>>>()?;
        let exclude = if exclude.is_empty() { None } else { Some(exclude) };

        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(user_uuid, name, display_name, exclude)
            .map_err(|e| AppError::Internal(format!("start registration failed: {e}")))?;

        ceremony_start(&ccr, &reg_state)
    }

    fn verify_attestation(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
    ) -> AppResult<RegisteredKey> {
        let reg_state: PasskeyRegistration = restore_state(challenge)?;
        let reg_credential: RegisterPublicKeyCredential = response.parse()?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&reg_credential, &reg_state)
            .map_err(|e| AppError::VerificationFailed(e.to_string()))?;

        let key = serde_json::to_vec(&passkey)
            .map_err(|e| AppError::Internal(format!("Serialize passkey failed: {e}")))?;

        Ok(RegisteredKey {
            credential_id: BASE64_URL_SAFE_NO_PAD.encode(passkey.cred_id()),
            public_key: PublicKeyMaterial {
                algorithm: passkey.cred_algorithm().clone() as i64,
                key,
            },
        })
    }

    fn start_authentication(&self, credentials: &[Credential]) -> AppResult<CeremonyStart> {
        let passkeys = credentials
            .iter()
            .map(load_passkey)
            .collect::<AppResult<Vec<Passkey>>>()?;

        let (rcr, auth_state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| AppError::Internal(format!("start authentication failed: {e}")))?;

        ceremony_start(&rcr, &auth_state)
    }

    fn verify_assertion(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
        _credential: &Credential,
    ) -> AppResult<AssertionOutcome> {
        // The state already lists every key allowed at begin
        let auth_state: PasskeyAuthentication = restore_state(challenge)?;
        let auth_credential: PublicKeyCredential = response.parse()?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&auth_credential, &auth_state)
            .map_err(|e| AppError::VerificationFailed(e.to_string()))?;

        Ok(AssertionOutcome {
            credential_id: BASE64_URL_SAFE_NO_PAD.encode(result.cred_id()),
            counter: result.counter(),
            user_verified: result.user_verified(),
        })
    }
}

fn load_passkey(credential: &Credential) -> AppResult<Passkey> {
    serde_json::from_slice(&credential.public_key.key).map_err(|_| {
        AppError::Internal(format!(
            "Deserialize passkey failed for credential {}",
            credential.credential_id
        ))
    })
}

fn restore_state<T: DeserializeOwned>(challenge: &Challenge) -> AppResult<T> {
    serde_json::from_slice(&challenge.state).map_err(|e| {
        AppError::Internal(format!(
            "ceremony state of challenge {} is unreadable: {e}",
            challenge.id
        ))
    })
}

/// Serialize the options and state, and pull the challenge bytes out of the
/// options so the store records exactly what the browser will sign
fn ceremony_start<O: Serialize, S: Serialize>(options: &O, state: &S) -> AppResult<CeremonyStart> {
    let options = serde_json::to_value(options)
        .map_err(|e| AppError::Internal(format!("Serialize options failed: {e}")))?;
    let state = serde_json::to_vec(state)
        .map_err(|e| AppError::Internal(format!("Serialize ceremony state failed: {e}")))?;

    let value = options["publicKey"]["challenge"]
        .as_str()
        .and_then(decode_base64url)
        .ok_or_else(|| AppError::Internal("options carry no challenge".into()))?;

    Ok(CeremonyStart {
        options,
        seed: ChallengeSeed { value, state },
    })
}

/// Decode base64url with or without padding
pub fn decode_base64url(raw: &str) -> Option<Vec<u8>> {
    BASE64_URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .ok()
}
