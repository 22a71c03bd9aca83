use crate::db::models::{timestamp, UserRow};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::store::UserDirectory;
use async_trait::async_trait;
use sqlx::SqlitePool;

const COLUMNS: &str =
    "id, email, display_name, avatar_url, bio, location, timezone, created_at, updated_at";

pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create_user(&self, email: &str, display_name: &str) -> AppResult<User> {
        let user = User::new(email.to_string(), display_name.to_string());

        sqlx::query(
            "INSERT INTO users (id, email, display_name, avatar_url, bio, location, timezone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.profile.display_name)
        .bind(&user.profile.avatar_url)
        .bind(&user.profile.bio)
        .bind(&user.profile.location)
        .bind(&user.profile.timezone)
        .bind(timestamp(user.created_at))
        .bind(timestamp(user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::UserAlreadyExists,
            _ => AppError::Database(e),
        })?;

        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::UserNotFound)?;

        User::try_from(row)
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        let row =
            sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(AppError::UserNotFound)?;

        User::try_from(row)
    }
}
