use crate::db::models::{timestamp, ChallengeRow};
use crate::error::{AppError, AppResult};
use crate::models::{Challenge, ChallengePurpose, ChallengeSeed};
use crate::store::ChallengeStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

const COLUMNS: &str = "id, challenge, state, purpose, user_ref, created_at, expires_at";

pub struct SqliteChallengeStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteChallengeStore {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[async_trait]
impl ChallengeStore for SqliteChallengeStore {
    async fn issue_seeded(
        &self,
        purpose: ChallengePurpose,
        user_ref: &str,
        seed: ChallengeSeed,
    ) -> AppResult<Challenge> {
        let challenge = Challenge::from_seed(purpose, user_ref, seed, self.ttl)?;

        sqlx::query(
            "INSERT INTO challenges (id, challenge, state, purpose, user_ref, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&challenge.id)
        .bind(&challenge.value)
        .bind(&challenge.state)
        .bind(purpose.as_str())
        .bind(&challenge.user_ref)
        .bind(timestamp(challenge.created_at))
        .bind(timestamp(challenge.expires_at()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(challenge_id = %challenge.id, %purpose, "challenge issued");
        Ok(challenge)
    }

    async fn resolve(&self, challenge_id: &str) -> AppResult<Challenge> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            "SELECT {COLUMNS} FROM challenges WHERE id = ?"
        ))
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ChallengeNotFound)?;

        let challenge = Challenge::try_from(row)?;
        if challenge.is_expired() {
            self.consume(challenge_id).await?;
            return Err(AppError::ChallengeExpired);
        }
        Ok(challenge)
    }

    async fn consume(&self, challenge_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM challenges WHERE id = ?")
            .bind(challenge_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn take(&self, challenge_id: &str) -> AppResult<Challenge> {
        // A single DELETE ... RETURNING, so at most one caller gets the row
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            "DELETE FROM challenges WHERE id = ? RETURNING {COLUMNS}"
        ))
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ChallengeNotFound)?;

        let challenge = Challenge::try_from(row)?;
        if challenge.is_expired() {
            return Err(AppError::ChallengeExpired);
        }
        Ok(challenge)
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM challenges WHERE expires_at < ?")
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_take_is_one_shot() {
        let store = SqliteChallengeStore::new(connect_in_memory().await.unwrap(), Duration::seconds(60));
        let issued = store
            .issue(ChallengePurpose::Registration, "user-1")
            .await
            .unwrap();

        let taken = store.take(&issued.id).await.unwrap();
        assert_eq!(taken.value, issued.value);
        assert_eq!(taken.purpose, ChallengePurpose::Registration);
        assert_eq!(taken.user_ref, "user-1");

        assert!(matches!(
            store.take(&issued.id).await,
            Err(AppError::ChallengeNotFound)
        ));
        assert!(matches!(
            store.resolve(&issued.id).await,
            Err(AppError::ChallengeNotFound)
        ));
    }

    #[tokio::test]
    async fn test_ceremony_state_round_trips() {
        let store = SqliteChallengeStore::new(connect_in_memory().await.unwrap(), Duration::seconds(60));
        let seed = ChallengeSeed {
            value: vec![7; 32],
            state: br#"{"rs":"opaque"}"#.to_vec(),
        };
        let issued = store
            .issue_seeded(ChallengePurpose::Authentication, "user-1", seed)
            .await
            .unwrap();

        let taken = store.take(&issued.id).await.unwrap();
        assert_eq!(taken.value, vec![7; 32]);
        assert_eq!(taken.state, br#"{"rs":"opaque"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_expired_challenge() {
        let store = SqliteChallengeStore::new(
            connect_in_memory().await.unwrap(),
            Duration::milliseconds(10),
        );
        let issued = store
            .issue(ChallengePurpose::Authentication, "user-1")
            .await
            .unwrap();
        let other = store
            .issue(ChallengePurpose::Authentication, "user-2")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(25)).await;

        assert!(matches!(
            store.resolve(&issued.id).await,
            Err(AppError::ChallengeExpired)
        ));
        assert!(matches!(
            store.resolve(&issued.id).await,
            Err(AppError::ChallengeNotFound)
        ));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(matches!(
            store.take(&other.id).await,
            Err(AppError::ChallengeNotFound)
        ));
    }
}
