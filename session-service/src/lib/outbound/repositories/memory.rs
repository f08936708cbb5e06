use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::Role;
use crate::domain::session::models::RotationOutcome;
use crate::domain::session::models::TemporaryToken;
use crate::domain::session::models::TemporaryTokenKind;
use crate::domain::session::models::TokenEffect;
use crate::domain::session::models::User;
use crate::domain::session::models::UserId;
use crate::domain::session::models::Username;
use crate::session::errors::StoreError;
use crate::session::ports::RefreshTokenRepository;
use crate::session::ports::UserRepository;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

fn revoke_family(
    records: &mut HashMap<String, RefreshTokenRecord>,
    user_id: &UserId,
    reason: RevocationReason,
    now: DateTime<Utc>,
) -> u64 {
    let mut revoked = 0;
    for record in records.values_mut() {
        if &record.user_id == user_id && record.revoke(reason, now) {
            revoked += 1;
        }
    }
    revoked
}

/// Process-local user store.
///
/// Every operation runs under one lock shared with the refresh-token ledger built by
/// [`InMemoryUserRepository::refresh_tokens`], so check-and-set sequences and the
/// revocations that accompany credential or role changes are linearized.
#[derive(Default)]
pub struct InMemoryUserRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh-token ledger over the same tables.
    pub fn refresh_tokens(&self) -> InMemoryRefreshTokenRepository {
        InMemoryRefreshTokenRepository {
            tables: Arc::clone(&self.tables),
        }
    }
}

fn unique_violation(existing: &User, candidate: &User) -> Option<&'static str> {
    if existing.email == candidate.email {
        return Some("users_email_key");
    }
    if existing.username.is_some() && existing.username == candidate.username {
        return Some("users_username_key");
    }
    if existing.provider_id.is_some()
        && existing.login_type == candidate.login_type
        && existing.provider_id == candidate.provider_id
    {
        return Some("users_login_type_provider_id_key");
    }
    None
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        let users = &mut tables.users;

        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict("users_pkey".to_string()));
        }
        if let Some(constraint) = users
            .values()
            .find_map(|existing| unique_violation(existing, &user))
        {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|user| user.username.as_ref() == Some(username))
            .cloned())
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(user) = self.tables.lock().await.users.get_mut(id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u64>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Tables {
            users,
            refresh_tokens,
        } = &mut *tables;

        let Some(user) = users.get_mut(id) else {
            return Ok(None);
        };
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = at;

        Ok(Some(revoke_family(
            refresh_tokens,
            id,
            RevocationReason::PasswordChanged,
            at,
        )))
    }

    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Tables {
            users,
            refresh_tokens,
        } = &mut *tables;

        let Some(user) = users.get_mut(id) else {
            return Ok(None);
        };
        user.role = role;
        user.updated_at = at;
        revoke_family(refresh_tokens, id, RevocationReason::RoleChanged, at);

        Ok(Some(user.clone()))
    }

    async fn store_temporary_token(
        &self,
        id: &UserId,
        kind: TemporaryTokenKind,
        token: &TemporaryToken,
    ) -> Result<bool, StoreError> {
        match self.tables.lock().await.users.get_mut(id) {
            Some(user) => {
                *user.temporary_token_mut(kind) = Some(token.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_temporary_token(
        &self,
        kind: TemporaryTokenKind,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|user| {
                user.temporary_token(kind)
                    .map(|token| token.digest == digest && token.is_live(now))
                    .unwrap_or(false)
            })
            .cloned())
    }

    async fn consume_temporary_token(
        &self,
        digest: &str,
        effect: &TokenEffect,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError> {
        let kind = effect.kind();
        let mut tables = self.tables.lock().await;
        let Tables {
            users,
            refresh_tokens,
        } = &mut *tables;

        let Some(user) = users.values_mut().find(|user| {
            user.temporary_token(kind)
                .map(|token| token.digest == digest && token.is_live(now))
                .unwrap_or(false)
        }) else {
            return Ok(None);
        };

        *user.temporary_token_mut(kind) = None;
        match effect {
            TokenEffect::VerifyEmail => user.is_email_verified = true,
            TokenEffect::ResetPassword { password_hash } => {
                user.password_hash = Some(password_hash.clone())
            }
        }
        user.updated_at = now;

        let id = user.id;
        if let TokenEffect::ResetPassword { .. } = effect {
            revoke_family(refresh_tokens, &id, RevocationReason::PasswordChanged, now);
        }

        Ok(Some(id))
    }
}

/// Process-local refresh-token ledger keyed by token digest.
///
/// `new` gives a standalone ledger; one built from a user store shares its lock.
#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let records = &mut tables.refresh_tokens;
        if records.contains_key(&record.token_digest) {
            return Err(StoreError::Conflict(
                "refresh_tokens_token_digest_key".to_string(),
            ));
        }
        records.insert(record.token_digest.clone(), record);
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.tables.lock().await.refresh_tokens.get(digest).cloned())
    }

    async fn rotate(
        &self,
        digest: &str,
        successor: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let records = &mut tables.refresh_tokens;

        if records.contains_key(&successor.token_digest) {
            return Err(StoreError::Conflict(
                "refresh_tokens_token_digest_key".to_string(),
            ));
        }

        let Some(record) = records.get_mut(digest) else {
            return Ok(RotationOutcome::Missing);
        };
        if record.revoked {
            return Ok(RotationOutcome::NotLive);
        }
        if record.is_expired(now) {
            return Ok(RotationOutcome::Expired);
        }

        record.revoke(RevocationReason::Rotated, now);
        records.insert(successor.token_digest.clone(), successor);

        Ok(RotationOutcome::Rotated)
    }

    async fn revoke_one(
        &self,
        digest: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .refresh_tokens
            .get_mut(digest)
            .map(|record| record.revoke(reason, now))
            .unwrap_or(false))
    }

    async fn revoke_all(
        &self,
        user_id: &UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let records = &mut tables.refresh_tokens;
        Ok(revoke_family(records, user_id, reason, now))
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let records = &mut tables.refresh_tokens;
        let before = records.len();
        records.retain(|_, record| record.expires_at >= cutoff);

        Ok((before - records.len()) as u64)
    }
}
