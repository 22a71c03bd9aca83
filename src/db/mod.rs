//! # Database Module
//!
//! SQLite implementations of the store traits:
//! - `models`: row types and conversions into domain types
//! - `users`: the user directory
//! - `credentials`: passkey credentials with compare-and-swap counters
//! - `challenges`: one-time ceremony challenges

pub mod challenges;
pub mod credentials;
pub mod models;
pub mod users;

pub use challenges::SqliteChallengeStore;
pub use credentials::SqliteCredentialStore;
pub use users::SqliteUserDirectory;

use crate::error::AppResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Open a connection pool and bring the schema up to date
pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database, used by tests
///
/// Every new connection to `sqlite::memory:` opens a separate database, so
/// the pool is capped at one connection.
pub async fn connect_in_memory() -> AppResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::AppError::Database(e.into()))
}
