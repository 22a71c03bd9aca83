//! # Domain Models
//!
//! Backend-independent types shared by the stores, the ceremony engine and
//! the gateway. The SQLite row shapes live in `db::models` and convert into
//! these.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of random bytes in every challenge
pub const CHALLENGE_LEN: usize = 32;

/// User account
///
/// The id is assigned once by the user directory and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Unique per directory
    pub email: String,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            profile: UserProfile::new(display_name),
            created_at: now,
            updated_at: now,
        }
    }

    /// WebAuthn user handle: the 16 UUID bytes, or the raw id bytes when the
    /// id is not a UUID
    pub fn handle(&self) -> Vec<u8> {
        match Uuid::parse_str(&self.id) {
            Ok(uuid) => uuid.as_bytes().to_vec(),
            Err(_) => self.id.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
}

impl UserProfile {
    pub fn new(display_name: String) -> Self {
        Self {
            display_name,
            avatar_url: None,
            bio: None,
            location: None,
            timezone: "UTC".to_string(),
        }
    }
}

/// Public half of an authenticator key pair, tagged with its COSE algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    pub algorithm: i64,
    /// Encoded by the verifier that accepted the registration; for
    /// `WebauthnVerifier` this is the serialized `Passkey`
    pub key: Vec<u8>,
}

/// Registered public-key credential
///
/// `signature_counter` only ever moves forward; the stores reject any update
/// that does not strictly increase it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Authenticator-assigned id, base64url without padding
    pub credential_id: String,
    pub user_id: String,
    pub public_key: PublicKeyMaterial,
    pub signature_counter: u32,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(credential_id: String, user_id: String, public_key: PublicKeyMaterial) -> Self {
        Self {
            credential_id,
            user_id,
            public_key,
            signature_counter: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

/// Which ceremony a challenge was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePurpose {
    Registration,
    Authentication,
}

impl ChallengePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengePurpose::Registration => "registration",
            ChallengePurpose::Authentication => "authentication",
        }
    }
}

impl fmt::Display for ChallengePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(ChallengePurpose::Registration),
            "authentication" => Ok(ChallengePurpose::Authentication),
            other => Err(format!("unknown challenge purpose: {other}")),
        }
    }
}

/// What a challenge is issued from: the bytes the authenticator signs and
/// the verifier state that `complete` needs back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSeed {
    pub value: Vec<u8>,
    /// Opaque to the stores; empty when the verifier keeps no state
    pub state: Vec<u8>,
}

impl ChallengeSeed {
    /// [`CHALLENGE_LEN`] bytes from the OS CSPRNG, no verifier state
    pub fn random() -> Self {
        let mut value = vec![0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut value);
        Self {
            value,
            state: Vec::new(),
        }
    }
}

/// One-time ceremony challenge
///
/// Owned by the challenge store for its whole life. Once taken it is gone,
/// whatever the outcome of the ceremony that took it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: String,
    pub value: Vec<u8>,
    pub purpose: ChallengePurpose,
    pub user_ref: String,
    /// Verifier state serialized at begin
    pub state: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Challenge {
    /// Challenge from a seed, random or produced by the verifier
    ///
    /// Values shorter than [`CHALLENGE_LEN`] are refused.
    pub fn from_seed(
        purpose: ChallengePurpose,
        user_ref: &str,
        seed: ChallengeSeed,
        ttl: Duration,
    ) -> AppResult<Self> {
        if seed.value.len() < CHALLENGE_LEN {
            return Err(AppError::Internal(format!(
                "challenge value is {} bytes, need at least {CHALLENGE_LEN}",
                seed.value.len()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            value: seed.value,
            purpose,
            user_ref: user_ref.to_string(),
            state: seed.state,
            created_at: Utc::now(),
            ttl,
        })
    }

    /// Saturates at the largest representable instant instead of overflowing
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
