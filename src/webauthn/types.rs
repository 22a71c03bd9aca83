//! # WebAuthn API Types
//!
//! Two groups of types live here:
//! - WebAuthn JSON exchanged with the browser. The options and the
//!   authenticator's response are kept as raw JSON: `webauthn-rs` produces
//!   and parses them, the gateway only reads the few fields it binds on.
//! - Gateway request bodies, which use snake_case like the rest of the API.
//!
//! Each ceremony has two steps: *start* issues a challenge, *finish* echoes
//! the `challenge_id` back together with the authenticator's response.

use crate::error::{AppError, AppResult};
use crate::webauthn::verifier::decode_base64url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for `navigator.credentials.create()` or `.get()`, tagged with the
/// id of the challenge they were issued with
///
/// ## Example JSON
/// ```json
/// {
///   "challengeId": "0b6c...",
///   "publicKey": {
///     "challenge": "q83vEjRWeJq83vEjRWeJq83vEjRWeJq83vEjRWeJq80",
///     "rp": { "id": "localhost", "name": "Passkey Gateway" },
///     "user": { "id": "3q2-7w", "name": "alice@example.com", "displayName": "Alice" },
///     "timeout": 300000
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyOptions {
    pub challenge_id: String,
    #[serde(flatten)]
    pub options: Value,
}

impl CeremonyOptions {
    pub fn public_key(&self) -> &Value {
        &self.options["publicKey"]
    }

    /// Decoded challenge bytes the authenticator has to sign
    pub fn challenge(&self) -> Option<Vec<u8>> {
        self.public_key()["challenge"]
            .as_str()
            .and_then(decode_base64url)
    }
}

/// Credential returned by `navigator.credentials.create()` or `.get()`, as
/// produced by `PublicKeyCredential.toJSON()`
///
/// ## Why serde_json::Value?
/// The verifier owns the full structure. The engine only needs `id` and
/// `response.userHandle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialResponse(pub Value);

impl CredentialResponse {
    /// Credential id, base64url
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// `response.userHandle`, base64url; absent or null for most
    /// non-discoverable credentials
    pub fn user_handle(&self) -> Option<&str> {
        self.0
            .get("response")
            .and_then(|r| r.get("userHandle"))
            .and_then(Value::as_str)
    }

    /// Parse into a concrete credential type
    ///
    /// # Errors
    /// `VerificationFailed` when the JSON does not have the expected shape.
    pub fn parse<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| AppError::VerificationFailed(format!("malformed credential: {e}")))
    }
}

/// Request to create a user account
///
/// ## Example JSON
/// ```json
/// { "email": "alice@example.com", "display_name": "Alice" }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

/// Request to start passkey registration for an existing user
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationStartRequest {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// Request to complete passkey registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationFinishRequest {
    pub user_id: String,
    /// Echoed from the start response
    pub challenge_id: String,
    pub credential: CredentialResponse,
}

/// Request to start passkey authentication
///
/// ## Example JSON
/// ```json
/// { "email": "alice@example.com" }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationStartRequest {
    pub email: String,
}

/// Request to complete passkey authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationFinishRequest {
    pub email: String,
    pub challenge_id: String,
    pub credential: CredentialResponse,
}
