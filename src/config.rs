//! # Configuration Management
//!
//! Configuration comes from the environment (12-factor style), with a `.env`
//! file honoured for local development.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8080)
//! - `DATABASE_URL`: SQLite connection string; unset selects in-memory stores
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_NAME`: Human-readable name for your service
//! - `RP_ORIGIN`: Origin the authenticator reports in client data
//! - `TOKEN_SECRET`: HMAC secret for session tokens (required)
//! - `TOKEN_TTL_MINUTES`: Session token lifetime (default: 30)
//! - `CHALLENGE_TTL_SECONDS`: Ceremony challenge lifetime (default: 300)
//! - `CHALLENGE_SWEEP_INTERVAL_SECONDS`: Expired challenge sweep period (default: 600)

use crate::error::{AppError, AppResult};
use std::env;
use std::fmt;
use std::str::FromStr;

const RECOMMENDED_CHALLENGE_TTL: std::ops::RangeInclusive<u64> = 60..=300;
const RECOMMENDED_SECRET_LEN: usize = 32;

/// One week
pub const MAX_TOKEN_TTL_MINUTES: i64 = 10_080;
/// One day
pub const MAX_CHALLENGE_TTL_SECONDS: u64 = 86_400;

/// Relying party identity shared by the ceremony engine and the verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// Domain-scoped identifier, e.g. "example.com" or "localhost"
    pub id: String,
    /// Display name shown by the authenticator
    pub name: String,
    /// Full origin, e.g. "https://example.com"
    pub origin: String,
}

/// Application configuration
///
/// Every field is resolved once at startup; nothing re-reads the environment
/// afterwards.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs the gateway on the in-memory stores
    pub database_url: Option<String>,
    pub relying_party: RelyingParty,
    pub token_secret: String,
    pub token_ttl_minutes: i64,
    pub challenge_ttl_seconds: u64,
    pub challenge_sweep_interval_seconds: u64,
}

// Hand-written so the token secret never reaches the log.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("relying_party", &self.relying_party)
            .field("token_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("challenge_ttl_seconds", &self.challenge_ttl_seconds)
            .field(
                "challenge_sweep_interval_seconds",
                &self.challenge_sweep_interval_seconds,
            )
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` first (a missing file is fine), then delegates to
    /// [`Config::from_source`].
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8080
    /// DATABASE_URL=sqlite:passkey.db?mode=rwc
    /// RP_ID=localhost
    /// RP_NAME=Passkey Gateway
    /// RP_ORIGIN=http://localhost:8080
    /// TOKEN_SECRET=change-me-to-a-long-random-value-please
    /// TOKEN_TTL_MINUTES=30
    /// CHALLENGE_TTL_SECONDS=300
    /// ```
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// `AppError::Configuration` when `TOKEN_SECRET` is missing or empty, when
    /// a numeric value does not parse, or when a TTL is zero or above its
    /// maximum.
    pub fn from_source<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_secret = lookup("TOKEN_SECRET").unwrap_or_default();
        if token_secret.is_empty() {
            return Err(AppError::Configuration(
                "TOKEN_SECRET must be set to a non-empty value".into(),
            ));
        }
        if token_secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                "TOKEN_SECRET is shorter than {} bytes; use a long random value in production",
                RECOMMENDED_SECRET_LEN
            );
        }

        let token_ttl_minutes: i64 = parse_or(&lookup, "TOKEN_TTL_MINUTES", 30)?;
        if token_ttl_minutes <= 0 {
            return Err(AppError::Configuration(
                "TOKEN_TTL_MINUTES must be positive".into(),
            ));
        }
        if token_ttl_minutes > MAX_TOKEN_TTL_MINUTES
            || chrono::Duration::try_minutes(token_ttl_minutes).is_none()
        {
            return Err(AppError::Configuration(format!(
                "TOKEN_TTL_MINUTES must be at most {MAX_TOKEN_TTL_MINUTES}"
            )));
        }

        let challenge_ttl_seconds: u64 = parse_or(&lookup, "CHALLENGE_TTL_SECONDS", 300)?;
        if challenge_ttl_seconds == 0 {
            return Err(AppError::Configuration(
                "CHALLENGE_TTL_SECONDS must be positive".into(),
            ));
        }
        let within_range = i64::try_from(challenge_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .is_some();
        if challenge_ttl_seconds > MAX_CHALLENGE_TTL_SECONDS || !within_range {
            return Err(AppError::Configuration(format!(
                "CHALLENGE_TTL_SECONDS must be at most {MAX_CHALLENGE_TTL_SECONDS}"
            )));
        }
        if !RECOMMENDED_CHALLENGE_TTL.contains(&challenge_ttl_seconds) {
            tracing::warn!(
                challenge_ttl_seconds,
                "challenge TTL outside the recommended 60-300s window"
            );
        }

        let challenge_sweep_interval_seconds: u64 =
            parse_or(&lookup, "CHALLENGE_SWEEP_INTERVAL_SECONDS", 600)?;
        if challenge_sweep_interval_seconds == 0 {
            return Err(AppError::Configuration(
                "CHALLENGE_SWEEP_INTERVAL_SECONDS must be positive".into(),
            ));
        }

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            relying_party: RelyingParty {
                id: lookup("RP_ID").unwrap_or_else(|| "localhost".to_string()),
                name: lookup("RP_NAME").unwrap_or_else(|| "Passkey Gateway".to_string()),
                origin: lookup("RP_ORIGIN")
                    .unwrap_or_else(|| "http://localhost:8080".to_string()),
            },
            token_secret,
            token_ttl_minutes,
            challenge_ttl_seconds,
            challenge_sweep_interval_seconds,
        })
    }

    /// Get the socket address to bind the server to, e.g. "127.0.0.1:8080"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session token lifetime
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.token_ttl_minutes.min(MAX_TOKEN_TTL_MINUTES))
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Ceremony challenge lifetime
    pub fn challenge_ttl(&self) -> chrono::Duration {
        let seconds = self.challenge_ttl_seconds.min(MAX_CHALLENGE_TTL_SECONDS);
        chrono::Duration::try_seconds(seconds as i64).unwrap_or(chrono::Duration::MAX)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_secret() {
        let config = Config::from_source(source(&[(
            "TOKEN_SECRET",
            "a-test-secret-that-is-long-enough-for-hs256",
        )]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.database_url, None);
        assert_eq!(config.relying_party.id, "localhost");
        assert_eq!(config.token_ttl_minutes, 30);
        assert_eq!(config.challenge_ttl_seconds, 300);
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = Config::from_source(source(&[])).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");

        let err = Config::from_source(source(&[("TOKEN_SECRET", "")])).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn test_invalid_numbers_are_fatal() {
        let err = Config::from_source(source(&[
            ("TOKEN_SECRET", "secret"),
            ("CHALLENGE_TTL_SECONDS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let err = Config::from_source(source(&[
            ("TOKEN_SECRET", "secret"),
            ("TOKEN_TTL_MINUTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_oversized_ttls_are_refused() {
        for (key, value) in [
            ("CHALLENGE_TTL_SECONDS", "18446744073709551615"),
            ("CHALLENGE_TTL_SECONDS", "86401"),
            ("TOKEN_TTL_MINUTES", "9223372036854775807"),
            ("TOKEN_TTL_MINUTES", "200000000000"),
            ("TOKEN_TTL_MINUTES", "10081"),
        ] {
            let err = Config::from_source(source(&[("TOKEN_SECRET", "secret"), (key, value)]))
                .unwrap_err();
            assert!(matches!(err, AppError::Configuration(_)), "{key}={value}");
        }
    }

    #[test]
    fn test_maximum_ttls_are_usable() {
        let config = Config::from_source(source(&[
            ("TOKEN_SECRET", "secret"),
            ("TOKEN_TTL_MINUTES", "10080"),
            ("CHALLENGE_TTL_SECONDS", "86400"),
        ]))
        .unwrap();

        assert_eq!(config.token_ttl(), chrono::Duration::days(7));
        assert_eq!(config.challenge_ttl(), chrono::Duration::days(1));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_source(source(&[("TOKEN_SECRET", "hunter2-hunter2")])).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
