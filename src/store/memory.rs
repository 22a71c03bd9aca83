//! In-memory stores on `DashMap`.
//!
//! Every operation locks only the shard holding its key, so unrelated
//! challenges and credentials never contend.

use super::{ChallengeStore, CredentialStore, UserDirectory};
use crate::error::{AppError, AppResult};
use crate::models::{Challenge, ChallengePurpose, ChallengeSeed, Credential, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub struct MemoryChallengeStore {
    challenges: DashMap<String, Challenge>,
    ttl: Duration,
}

impl MemoryChallengeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            challenges: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn issue_seeded(
        &self,
        purpose: ChallengePurpose,
        user_ref: &str,
        seed: ChallengeSeed,
    ) -> AppResult<Challenge> {
        let challenge = Challenge::from_seed(purpose, user_ref, seed, self.ttl)?;
        self.challenges
            .insert(challenge.id.clone(), challenge.clone());

        tracing::debug!(challenge_id = %challenge.id, %purpose, "challenge issued");
        Ok(challenge)
    }

    async fn resolve(&self, challenge_id: &str) -> AppResult<Challenge> {
        // remove_if holds the shard lock across the expiry check
        if self
            .challenges
            .remove_if(challenge_id, |_, c| c.is_expired())
            .is_some()
        {
            return Err(AppError::ChallengeExpired);
        }

        self.challenges
            .get(challenge_id)
            .map(|c| c.value().clone())
            .ok_or(AppError::ChallengeNotFound)
    }

    async fn consume(&self, challenge_id: &str) -> AppResult<()> {
        self.challenges.remove(challenge_id);
        Ok(())
    }

    async fn take(&self, challenge_id: &str) -> AppResult<Challenge> {
        let (_, challenge) = self
            .challenges
            .remove(challenge_id)
            .ok_or(AppError::ChallengeNotFound)?;

        if challenge.is_expired() {
            return Err(AppError::ChallengeExpired);
        }
        Ok(challenge)
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let now = Utc::now();
        let before = self.challenges.len();
        self.challenges.retain(|_, c| !c.is_expired_at(now));
        Ok(before.saturating_sub(self.challenges.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<String, Credential>,
    // user id -> credential ids in insertion order
    by_user: DashMap<String, Vec<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, credential: &Credential) -> AppResult<()> {
        match self.credentials.entry(credential.credential_id.clone()) {
            Entry::Occupied(_) => return Err(AppError::DuplicateCredential),
            Entry::Vacant(entry) => {
                entry.insert(credential.clone());
            }
        }

        self.by_user
            .entry(credential.user_id.clone())
            .or_default()
            .push(credential.credential_id.clone());
        Ok(())
    }

    async fn get_by_id(&self, credential_id: &str) -> AppResult<Credential> {
        self.credentials
            .get(credential_id)
            .map(|c| c.value().clone())
            .ok_or(AppError::CredentialNotFound)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Credential>> {
        let ids = match self.by_user.get(user_id) {
            Some(ids) => ids.value().clone(),
            None => return Ok(Vec::new()),
        };

        Ok(ids
            .iter()
            .filter_map(|id| self.credentials.get(id).map(|c| c.value().clone()))
            .collect())
    }

    async fn update_counter(&self, credential_id: &str, new_counter: u32) -> AppResult<()> {
        let mut credential = self
            .credentials
            .get_mut(credential_id)
            .ok_or(AppError::CredentialNotFound)?;

        if new_counter <= credential.signature_counter {
            return Err(AppError::CounterRegression {
                stored: credential.signature_counter,
                reported: new_counter,
            });
        }

        credential.signature_counter = new_counter;
        credential.last_used_at = Some(Utc::now());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, User>,
    // email -> user id
    emails: DashMap<String, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create_user(&self, email: &str, display_name: &str) -> AppResult<User> {
        let user = User::new(email.to_string(), display_name.to_string());

        // The vacant entry keeps the email's shard locked until the user
        // record exists, so neither a second sign-up nor an email lookup can
        // observe the email without its user
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AppError::UserAlreadyExists),
            Entry::Vacant(entry) => {
                self.users.insert(user.id.clone(), user.clone());
                entry.insert(user.id.clone());
                Ok(user)
            }
        }
    }

    async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.users
            .get(user_id)
            .map(|u| u.value().clone())
            .ok_or(AppError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        let user_id = self
            .emails
            .get(email)
            .map(|id| id.value().clone())
            .ok_or(AppError::UserNotFound)?;
        self.get_user(&user_id).await
    }
}
