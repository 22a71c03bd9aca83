//! # Error Handling
//!
//! One error type for the whole gateway. Every ceremony, store and token
//! failure surfaces as a stable [`AppError`] kind; internal faults are logged
//! and replaced with a generic message before they reach a caller.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
///
/// Ceremony failures are terminal for the attempt that produced them: the
/// challenge has already been consumed by the time one of these is returned,
/// so a retry always needs a fresh *begin* call.
#[derive(Error, Debug)]
pub enum AppError {
    /// No live challenge with the given id (never issued, or already consumed)
    #[error("challenge not found")]
    ChallengeNotFound,

    /// The challenge existed but its TTL elapsed before completion
    #[error("challenge expired")]
    ChallengeExpired,

    /// The challenge was issued for a different user or ceremony
    #[error("challenge does not belong to this ceremony")]
    ChallengeMismatch,

    /// Unknown credential id, or one owned by another account
    #[error("credential not found")]
    CredentialNotFound,

    #[error("credential already registered")]
    DuplicateCredential,

    /// Reported signature counter did not strictly increase
    #[error("signature counter regression (stored {stored}, reported {reported})")]
    CounterRegression { stored: u32, reported: u32 },

    /// Attestation or assertion did not verify
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("token expired")]
    TokenExpired,

    #[error("token malformed")]
    TokenMalformed,

    #[error("token signature invalid")]
    TokenInvalidSignature,

    #[error("not authenticated")]
    Unauthenticated,

    /// Startup-fatal configuration problem
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// SQLx errors from the durable stores
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ChallengeNotFound => "challenge_not_found",
            AppError::ChallengeExpired => "challenge_expired",
            AppError::ChallengeMismatch => "challenge_mismatch",
            AppError::CredentialNotFound => "credential_not_found",
            AppError::DuplicateCredential => "duplicate_credential",
            AppError::CounterRegression { .. } => "counter_regression",
            AppError::VerificationFailed(_) => "verification_failed",
            AppError::UserNotFound => "user_not_found",
            AppError::UserAlreadyExists => "user_already_exists",
            AppError::TokenExpired => "token_expired",
            AppError::TokenMalformed => "token_malformed",
            AppError::TokenInvalidSignature => "token_invalid_signature",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Configuration(_) => "configuration_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether this failure should be reported on the `security` log target
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            AppError::CounterRegression { .. } | AppError::VerificationFailed(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ChallengeNotFound
            | AppError::ChallengeExpired
            | AppError::ChallengeMismatch
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::CredentialNotFound
            | AppError::CounterRegression { .. }
            | AppError::VerificationFailed(_)
            | AppError::TokenExpired
            | AppError::TokenMalformed
            | AppError::TokenInvalidSignature
            | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateCredential | AppError::UserAlreadyExists => StatusCode::CONFLICT,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convert AppError into an HTTP response
///
/// The body is always `{ "error": <kind>, "message": <text> }`. Messages for
/// server-side faults are generic; the detail only goes to the log.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Configuration(e) => {
                tracing::error!("Configuration error: {}", e);
                "Internal server error".to_string()
            }
            // Counter values stay in the log
            AppError::CounterRegression { .. } => "Authentication failed".to_string(),
            AppError::VerificationFailed(_) => "Verification failed".to_string(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": message,
        }));

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
