//! Shared fixtures: a software Ed25519 authenticator, the verifier that
//! understands it, and a gateway wired to in-memory stores.
//!
//! The soft authenticator speaks a reduced format: client data
//! `{type, challenge, origin}` signed directly by the credential key, with
//! the counter appended for assertions.

#![allow(dead_code)]

use base64::prelude::*;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use passkey_auth_gateway::config::Config;
use passkey_auth_gateway::error::{AppError, AppResult};
use passkey_auth_gateway::gateway::AuthGateway;
use passkey_auth_gateway::models::{
    Challenge, ChallengeSeed, Credential, PublicKeyMaterial, User,
};
use passkey_auth_gateway::store::{
    CredentialStore, MemoryChallengeStore, MemoryCredentialStore, MemoryUserDirectory,
};
use passkey_auth_gateway::token::TokenIssuer;
use passkey_auth_gateway::webauthn::types::{CeremonyOptions, CredentialResponse};
use passkey_auth_gateway::webauthn::verifier::{
    decode_base64url, AssertionOutcome, CeremonyStart, CredentialVerifier, RegisteredKey,
};
use passkey_auth_gateway::webauthn::CeremonyEngine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://login.example.com";
pub const SECRET: &str = "integration-test-secret-with-enough-length";

/// COSE algorithm identifier for EdDSA
pub const ALG_EDDSA: i64 = -8;

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("TOKEN_SECRET", SECRET),
        ("RP_ID", RP_ID),
        ("RP_NAME", "Example"),
        ("RP_ORIGIN", ORIGIN),
    ]);
    Config::from_source(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

pub fn b64(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

fn descriptors(credentials: &[Credential]) -> Vec<Value> {
    credentials
        .iter()
        .map(|c| json!({ "type": "public-key", "id": c.credential_id }))
        .collect()
}

#[derive(Debug, Deserialize)]
struct ClientData {
    #[serde(rename = "type")]
    ceremony: String,
    challenge: String,
    origin: String,
}

#[derive(Debug, Deserialize)]
struct SoftRegistration {
    id: String,
    response: SoftAttestation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftAttestation {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    public_key: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct SoftAssertion {
    id: String,
    response: SoftAssertionResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    counter: u32,
    signature: String,
}

fn failed(reason: &str) -> AppError {
    AppError::VerificationFailed(reason.to_string())
}

fn decode(raw: &str, field: &str) -> AppResult<Vec<u8>> {
    decode_base64url(raw).ok_or_else(|| failed(&format!("{field} is not base64url")))
}

/// Verifier for [`SoftAuthenticator`] responses
pub struct SoftVerifier {
    rp_id: String,
    origin: String,
}

impl SoftVerifier {
    pub fn new() -> Self {
        Self {
            rp_id: RP_ID.to_string(),
            origin: ORIGIN.to_string(),
        }
    }

    /// Check client data and return its raw bytes
    fn client_data(&self, raw: &str, ceremony: &str, challenge: &Challenge) -> AppResult<Vec<u8>> {
        let bytes = decode(raw, "clientDataJSON")?;
        let data: ClientData =
            serde_json::from_slice(&bytes).map_err(|_| failed("clientDataJSON is not JSON"))?;

        if data.ceremony != ceremony {
            return Err(failed("wrong ceremony type"));
        }
        if decode(&data.challenge, "challenge")? != challenge.value {
            return Err(failed("challenge mismatch"));
        }
        if data.origin != self.origin {
            return Err(failed("origin mismatch"));
        }
        Ok(bytes)
    }
}

fn verify_signature(key: &[u8], message: &[u8], signature: &str) -> AppResult<()> {
    let key: [u8; 32] = key.try_into().map_err(|_| failed("bad key length"))?;
    let key = VerifyingKey::from_bytes(&key).map_err(|_| failed("bad key"))?;
    let signature = Signature::from_slice(&decode(signature, "signature")?)
        .map_err(|_| failed("bad signature encoding"))?;
    key.verify(message, &signature)
        .map_err(|_| failed("signature does not verify"))
}

impl CredentialVerifier for SoftVerifier {
    fn start_registration(
        &self,
        user: &User,
        name: &str,
        display_name: &str,
        existing: &[Credential],
    ) -> AppResult<CeremonyStart> {
        let seed = ChallengeSeed::random();
        let options = json!({
            "publicKey": {
                "challenge": b64(&seed.value),
                "rp": { "id": self.rp_id, "name": "Example" },
                "user": { "id": b64(&user.handle()), "name": name, "displayName": display_name },
                "excludeCredentials": descriptors(existing),
            }
        });
        Ok(CeremonyStart { options, seed })
    }

    fn verify_attestation(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
    ) -> AppResult<RegisteredKey> {
        let registration: SoftRegistration = response.parse()?;
        let client_data = self.client_data(
            &registration.response.client_data_json,
            "webauthn.create",
            challenge,
        )?;

        let key = decode(&registration.response.public_key, "publicKey")?;
        verify_signature(&key, &client_data, &registration.response.signature)?;

        Ok(RegisteredKey {
            credential_id: registration.id,
            public_key: PublicKeyMaterial {
                algorithm: ALG_EDDSA,
                key,
            },
        })
    }

    fn start_authentication(&self, credentials: &[Credential]) -> AppResult<CeremonyStart> {
        let seed = ChallengeSeed::random();
        let options = json!({
            "publicKey": {
                "challenge": b64(&seed.value),
                "rpId": self.rp_id,
                "allowCredentials": descriptors(credentials),
            }
        });
        Ok(CeremonyStart { options, seed })
    }

    fn verify_assertion(
        &self,
        challenge: &Challenge,
        response: &CredentialResponse,
        credential: &Credential,
    ) -> AppResult<AssertionOutcome> {
        let assertion: SoftAssertion = response.parse()?;
        let mut signed =
            self.client_data(&assertion.response.client_data_json, "webauthn.get", challenge)?;
        signed.extend_from_slice(&assertion.response.counter.to_be_bytes());

        verify_signature(&credential.public_key.key, &signed, &assertion.response.signature)?;

        Ok(AssertionOutcome {
            credential_id: assertion.id,
            counter: assertion.response.counter,
            user_verified: true,
        })
    }
}

/// Authenticator that keeps its private key in memory
pub struct SoftAuthenticator {
    key: SigningKey,
    pub credential_id: String,
    pub counter: u32,
    origin: String,
}

impl SoftAuthenticator {
    pub fn new() -> Self {
        Self::for_origin(ORIGIN)
    }

    pub fn for_origin(origin: &str) -> Self {
        let mut id = [0u8; 16];
        OsRng.fill_bytes(&mut id);
        Self {
            key: SigningKey::generate(&mut OsRng),
            credential_id: b64(&id),
            counter: 0,
            origin: origin.to_string(),
        }
    }

    pub fn public_key(&self) -> PublicKeyMaterial {
        PublicKeyMaterial {
            algorithm: ALG_EDDSA,
            key: self.key.verifying_key().as_bytes().to_vec(),
        }
    }

    fn client_data(&self, ceremony: &str, options: &CeremonyOptions) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": ceremony,
            "challenge": options.public_key()["challenge"],
            "origin": self.origin,
        }))
        .unwrap()
    }

    /// Answer `navigator.credentials.create()`
    pub fn register(&self, options: &CeremonyOptions) -> CredentialResponse {
        let client_data = self.client_data("webauthn.create", options);
        let signature = self.key.sign(&client_data);

        CredentialResponse(json!({
            "id": self.credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": b64(&client_data),
                "publicKey": b64(self.key.verifying_key().as_bytes()),
                "signature": b64(&signature.to_bytes()),
            }
        }))
    }

    /// Answer `navigator.credentials.get()`, advancing the counter
    pub fn assert(&mut self, options: &CeremonyOptions) -> CredentialResponse {
        self.counter += 1;
        self.assert_with_counter(options, self.counter)
    }

    /// Sign an assertion reporting an arbitrary counter value
    pub fn assert_with_counter(&self, options: &CeremonyOptions, counter: u32) -> CredentialResponse {
        self.assert_with(options, counter, None)
    }

    /// Sign an assertion that also carries `userHandle`
    pub fn assert_with(
        &self,
        options: &CeremonyOptions,
        counter: u32,
        user_handle: Option<&[u8]>,
    ) -> CredentialResponse {
        let client_data = self.client_data("webauthn.get", options);
        let mut signed = client_data.clone();
        signed.extend_from_slice(&counter.to_be_bytes());
        let signature = self.key.sign(&signed);

        CredentialResponse(json!({
            "id": self.credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": b64(&client_data),
                "counter": counter,
                "signature": b64(&signature.to_bytes()),
                "userHandle": user_handle.map(b64),
            }
        }))
    }
}

/// Gateway over in-memory stores, with the concrete stores kept for
/// inspection
pub struct Harness {
    pub gateway: AuthGateway,
    pub tokens: TokenIssuer,
    pub challenges: Arc<MemoryChallengeStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub users: Arc<MemoryUserDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_challenge_ttl(test_config().challenge_ttl())
    }

    pub fn with_challenge_ttl(ttl: chrono::Duration) -> Self {
        let config = test_config();
        let challenges = Arc::new(MemoryChallengeStore::new(ttl));
        let credentials = Arc::new(MemoryCredentialStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let tokens = TokenIssuer::new(&config.token_secret, config.token_ttl()).unwrap();

        let engine = CeremonyEngine::new(
            challenges.clone(),
            credentials.clone(),
            users.clone(),
            Arc::new(SoftVerifier::new()),
        );

        Self {
            gateway: AuthGateway::new(users.clone(), engine, tokens.clone()),
            tokens,
            challenges,
            credentials,
            users,
        }
    }

    /// Create `email` and enroll `authenticator` for it; returns the user id
    pub async fn enroll(&self, email: &str, authenticator: &SoftAuthenticator) -> String {
        let user = self.gateway.register(email, "Test User").await.unwrap();
        let options = self
            .gateway
            .begin_registration(&user.id, email, "Test User")
            .await
            .unwrap();
        self.gateway
            .complete_registration(
                &user.id,
                &options.challenge_id,
                &authenticator.register(&options),
            )
            .await
            .unwrap();
        user.id
    }

    /// Create `email` and store `authenticator`'s key directly, without a
    /// ceremony; returns the user
    pub async fn enroll_stored(&self, email: &str, authenticator: &SoftAuthenticator) -> User {
        let user = self.gateway.register(email, "Test User").await.unwrap();
        let credential = Credential::new(
            authenticator.credential_id.clone(),
            user.id.clone(),
            authenticator.public_key(),
        );
        self.credentials.save(&credential).await.unwrap();
        user
    }
}
