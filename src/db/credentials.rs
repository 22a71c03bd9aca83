//! # Credential Database Operations
//!
//! Only public keys are stored; private keys never leave the authenticator.

use crate::db::models::{timestamp, CredentialRow};
use crate::error::{AppError, AppResult};
use crate::models::Credential;
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

const COLUMNS: &str = "id, user_id, public_key, algorithm, counter, created_at, last_used_at";

pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn save(&self, credential: &Credential) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO credentials (id, user_id, public_key, algorithm, counter, created_at, last_used_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&credential.credential_id)
        .bind(&credential.user_id)
        .bind(&credential.public_key.key)
        .bind(credential.public_key.algorithm)
        .bind(i64::from(credential.signature_counter))
        .bind(timestamp(credential.created_at))
        .bind(credential.last_used_at.map(timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateCredential
            }
            _ => AppError::Database(e),
        })?;

        Ok(())
    }

    async fn get_by_id(&self, credential_id: &str) -> AppResult<Credential> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {COLUMNS} FROM credentials WHERE id = ?"
        ))
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::CredentialNotFound)?;

        Credential::try_from(row)
    }

    /// Rowids grow with each insert, which gives insertion order
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Credential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {COLUMNS} FROM credentials WHERE user_id = ? ORDER BY rowid"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Credential::try_from).collect()
    }

    /// Update the signature counter for a credential
    ///
    /// The `counter < ?` guard makes the UPDATE itself the compare-and-swap:
    /// two concurrent logins reporting the same value cannot both match.
    async fn update_counter(&self, credential_id: &str, new_counter: u32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE credentials
             SET counter = ?, last_used_at = ?
             WHERE id = ? AND counter < ?",
        )
        .bind(i64::from(new_counter))
        .bind(timestamp(Utc::now()))
        .bind(credential_id)
        .bind(i64::from(new_counter))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing matched: either the id is unknown or the counter is stale
        let stored = self.get_by_id(credential_id).await?;
        Err(AppError::CounterRegression {
            stored: stored.signature_counter,
            reported: new_counter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::PublicKeyMaterial;

    fn credential(id: &str, user: &str) -> Credential {
        Credential::new(
            id.to_string(),
            user.to_string(),
            PublicKeyMaterial { algorithm: -8, key: vec![9; 32] },
        )
    }

    #[tokio::test]
    async fn test_save_and_fetch() {
        let store = SqliteCredentialStore::new(connect_in_memory().await.unwrap());
        let cred = credential("c1", "u1");
        store.save(&cred).await.unwrap();

        let fetched = store.get_by_id("c1").await.unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert_eq!(fetched.public_key, cred.public_key);
        assert_eq!(fetched.signature_counter, 0);

        assert!(matches!(
            store.save(&credential("c1", "u2")).await,
            Err(AppError::DuplicateCredential)
        ));
        assert!(matches!(
            store.get_by_id("nope").await,
            Err(AppError::CredentialNotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_by_user_in_insertion_order() {
        let store = SqliteCredentialStore::new(connect_in_memory().await.unwrap());
        for id in ["zeta", "alpha", "mid"] {
            store.save(&credential(id, "u1")).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.credential_id)
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert!(store.list_by_user("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_compare_and_swap() {
        let store = SqliteCredentialStore::new(connect_in_memory().await.unwrap());
        store.save(&credential("c1", "u1")).await.unwrap();

        store.update_counter("c1", 2).await.unwrap();
        assert!(matches!(
            store.update_counter("c1", 2).await,
            Err(AppError::CounterRegression { stored: 2, reported: 2 })
        ));
        assert!(matches!(
            store.update_counter("c1", 1).await,
            Err(AppError::CounterRegression { stored: 2, reported: 1 })
        ));
        assert!(matches!(
            store.update_counter("missing", 1).await,
            Err(AppError::CredentialNotFound)
        ));

        let stored = store.get_by_id("c1").await.unwrap();
        assert_eq!(stored.signature_counter, 2);
        assert!(stored.last_used_at.is_some());
    }
}
