//! Session token issuance and validation.
//!
//! Tokens are stateless HS256 JWTs: validity is signature plus expiry, no
//! store is consulted. The secret is loaded once at startup.
//!
//! There is no revocation list. Every token carries a random `jti`, which is
//! the key a denylist would use.

use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
}

/// Payload stored in the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub typ: TokenType,
    /// Token id, reserved for revocation
    pub jti: String,
}

/// Mints and verifies session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenIssuer {
    /// Build an issuer from the process-wide secret
    ///
    /// An empty secret is a configuration error.
    pub fn new(secret: &str, default_ttl: Duration) -> AppResult<Self> {
        if secret.is_empty() {
            return Err(AppError::Configuration(
                "token secret must not be empty".into(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            default_ttl,
        })
    }

    /// Mint an access token for `user_id` with the configured lifetime
    pub fn mint(&self, user_id: &str) -> AppResult<String> {
        self.mint_with_ttl(user_id, self.default_ttl)
    }

    pub fn mint_with_ttl(&self, user_id: &str, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(format!("Token lifetime out of range: {ttl}")))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            typ: TokenType::Access,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to mint token: {e}")))
    }

    /// Verify and decode a token
    ///
    /// ## Errors
    /// - TokenInvalidSignature: signed with another secret or tampered with
    /// - TokenExpired: signature fine, `exp` in the past
    /// - TokenMalformed: anything else (bad encoding, missing claims, ...)
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                ErrorKind::InvalidSignature => AppError::TokenInvalidSignature,
                _ => AppError::TokenMalformed,
            }
        })?;

        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let header = header?;
    let (scheme, token) = header.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "test-secret-that-is-at-least-32-characters-long",
            Duration::minutes(30),
        )
        .unwrap()
    }

    #[test]
    fn test_mint_and_verify() {
        let issuer = issuer();
        let token = issuer.mint("user-123").unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let token = issuer
            .mint_with_ttl("user-123", Duration::seconds(-30))
            .unwrap();

        assert!(matches!(issuer.verify(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = issuer().mint("user-123").unwrap();
        let other = TokenIssuer::new(
            "different-secret-that-is-at-least-32-characters",
            Duration::minutes(30),
        )
        .unwrap();

        assert!(matches!(
            other.verify(&token),
            Err(AppError::TokenInvalidSignature)
        ));
    }

    #[test]
    fn test_malformed_token() {
        let issuer = issuer();
        assert!(matches!(
            issuer.verify("not-a-token"),
            Err(AppError::TokenMalformed)
        ));
        assert!(matches!(issuer.verify(""), Err(AppError::TokenMalformed)));
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer();
        let a = issuer.verify(&issuer.mint("u").unwrap()).unwrap();
        let b = issuer.verify(&issuer.mint("u").unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let err = issuer().mint_with_ttl("user-123", Duration::MAX).unwrap_err();
        assert_eq!(err.kind(), "internal_error");
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenIssuer::new("", Duration::minutes(30)),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("Basic abc123")), None);
        assert_eq!(extract_bearer(Some("abc123")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
