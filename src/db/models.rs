//! # Database Models
//!
//! Row shapes for the SQLite tables, mapped with `sqlx::FromRow`, plus the
//! conversions into the domain types in [`crate::models`].
//!
//! ## Why Strings for dates?
//! SQLite has no native timestamp type. Timestamps are stored as RFC3339 text
//! in one fixed format (UTC, microseconds, `Z` suffix) so that plain string
//! comparison in SQL orders them correctly; the expiry sweep relies on that.

use crate::error::{AppError, AppResult};
use crate::models::{Challenge, Credential, PublicKeyMaterial, User, UserProfile};
use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way every table stores it
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AppError::Internal(format!("Invalid stored timestamp: {raw}")))
}

/// Row of the `users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            profile: UserProfile {
                display_name: row.display_name,
                avatar_url: row.avatar_url,
                bio: row.bio,
                location: row.location,
                timezone: row.timezone,
            },
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Row of the `credentials` table
///
/// `counter` is i64 because SQLite integers are signed 64-bit; the CHECK
/// constraint keeps it non-negative and the store never writes above u32.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub id: String,
    pub user_id: String,
    pub public_key: Vec<u8>,
    pub algorithm: i64,
    pub counter: i64,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = AppError;

    fn try_from(row: CredentialRow) -> AppResult<Self> {
        let signature_counter = u32::try_from(row.counter)
            .map_err(|_| AppError::Internal(format!("Stored counter out of range: {}", row.counter)))?;

        Ok(Credential {
            credential_id: row.id,
            user_id: row.user_id,
            public_key: PublicKeyMaterial {
                algorithm: row.algorithm,
                key: row.public_key,
            },
            signature_counter,
            created_at: parse_timestamp(&row.created_at)?,
            last_used_at: row.last_used_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Row of the `challenges` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChallengeRow {
    pub id: String,
    pub challenge: Vec<u8>,
    pub state: Vec<u8>,
    pub purpose: String,
    pub user_ref: String,
    pub created_at: String,
    pub expires_at: String,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = AppError;

    fn try_from(row: ChallengeRow) -> AppResult<Self> {
        let created_at = parse_timestamp(&row.created_at)?;
        let expires_at = parse_timestamp(&row.expires_at)?;

        Ok(Challenge {
            id: row.id,
            value: row.challenge,
            state: row.state,
            purpose: row.purpose.parse().map_err(AppError::Internal)?,
            user_ref: row.user_ref,
            created_at,
            ttl: expires_at - created_at,
        })
    }
}
