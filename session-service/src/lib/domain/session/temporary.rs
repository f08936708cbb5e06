use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::session::models::TemporaryToken;
use crate::domain::session::models::TemporaryTokenKind;
use crate::domain::session::models::TokenEffect;
use crate::domain::session::models::User;
use crate::domain::session::models::UserId;
use crate::session::errors::SessionError;
use crate::session::ports::UserRepository;

/// Default lifetime of a temporary token.
pub const DEFAULT_TEMPORARY_TOKEN_TTL_MINUTES: i64 = 20;

/// Single-use secrets for email verification and password reset.
///
/// Only a keyed digest is stored, tagged with the token kind so a verification secret
/// can never match a reset slot. At most one live token per kind per user: issuing
/// overwrites the slot.
pub struct TemporaryTokenManager<UR>
where
    UR: UserRepository,
{
    users: Arc<UR>,
    pepper: Vec<u8>,
    ttl: Duration,
}

impl<UR> TemporaryTokenManager<UR>
where
    UR: UserRepository,
{
    /// Create a manager.
    ///
    /// # Arguments
    /// * `users` - Store holding the token slots
    /// * `pepper` - Server-side key mixed into every digest
    /// * `ttl` - Lifetime of an issued token
    pub fn new(users: Arc<UR>, pepper: &[u8], ttl: Duration) -> Self {
        Self {
            users,
            pepper: pepper.to_vec(),
            ttl,
        }
    }

    /// Digest stored for a raw secret of the given kind.
    pub fn digest(&self, kind: TemporaryTokenKind, raw: &str) -> String {
        auth::secret::keyed_digest(&self.pepper, &format!("{}:{}", kind.as_str(), raw))
    }

    /// Issue a new token for a user, replacing any live token of the same kind.
    ///
    /// # Returns
    /// The raw secret, to be embedded in an out-of-band link
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `TransientStoreFailure` - Store operation failed
    pub async fn issue(
        &self,
        user_id: &UserId,
        kind: TemporaryTokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let raw = auth::secret::generate_secret();
        let token = TemporaryToken {
            digest: self.digest(kind, &raw),
            expires_at: now + self.ttl,
        };

        if !self
            .users
            .store_temporary_token(user_id, kind, &token)
            .await?
        {
            return Err(SessionError::NotFound);
        }

        tracing::debug!(
            user_id = %user_id,
            kind = kind.as_str(),
            expires_at = %token.expires_at,
            "Temporary token issued"
        );

        Ok(raw)
    }

    /// Find the owner of a live token without consuming it.
    ///
    /// # Errors
    /// * `TemporaryTokenInvalidOrExpired` - No live token matches
    pub async fn holder(
        &self,
        kind: TemporaryTokenKind,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<User, SessionError> {
        self.users
            .find_by_temporary_token(kind, &self.digest(kind, raw), now)
            .await?
            .ok_or(SessionError::TemporaryTokenInvalidOrExpired)
    }

    /// Consume a live token and apply its effect in the same write.
    ///
    /// # Errors
    /// * `TemporaryTokenInvalidOrExpired` - No live token matches, or another request
    ///   consumed it first
    pub async fn consume(
        &self,
        raw: &str,
        effect: TokenEffect,
        now: DateTime<Utc>,
    ) -> Result<UserId, SessionError> {
        let kind = effect.kind();
        let user_id = self
            .users
            .consume_temporary_token(&self.digest(kind, raw), &effect, now)
            .await?
            .ok_or(SessionError::TemporaryTokenInvalidOrExpired)?;

        tracing::debug!(user_id = %user_id, kind = kind.as_str(), "Temporary token consumed");

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::models::EmailAddress;
    use crate::domain::session::models::Username;
    use crate::outbound::repositories::memory::InMemoryUserRepository;

    const PEPPER: &[u8] = b"temporary-token-pepper-for-tests!";

    async fn seeded() -> (Arc<InMemoryUserRepository>, User) {
        let users = Arc::new(InMemoryUserRepository::new());
        let user = User::with_password(
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            Username::new("alice".to_string()).unwrap(),
            "$argon2id$placeholder".to_string(),
            Utc::now(),
        );
        let user = users.create(user).await.unwrap();
        (users, user)
    }

    fn manager(users: Arc<InMemoryUserRepository>) -> TemporaryTokenManager<InMemoryUserRepository> {
        TemporaryTokenManager::new(
            users,
            PEPPER,
            Duration::minutes(DEFAULT_TEMPORARY_TOKEN_TTL_MINUTES),
        )
    }

    #[tokio::test]
    async fn test_only_digest_is_stored() {
        let (users, user) = seeded().await;
        let manager = manager(users.clone());
        let now = Utc::now();

        let raw = manager
            .issue(&user.id, TemporaryTokenKind::EmailVerification, now)
            .await
            .unwrap();

        let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
        let slot = stored.email_verification.expect("slot should be filled");
        assert_ne!(slot.digest, raw);
        assert_eq!(slot.expires_at, now + Duration::minutes(20));
        assert_eq!(raw.len(), 64);
    }

    #[tokio::test]
    async fn test_consume_applies_effect_once() {
        let (users, user) = seeded().await;
        let manager = manager(users.clone());
        let now = Utc::now();

        let raw = manager
            .issue(&user.id, TemporaryTokenKind::EmailVerification, now)
            .await
            .unwrap();

        let consumed = manager
            .consume(&raw, TokenEffect::VerifyEmail, now)
            .await
            .unwrap();
        assert_eq!(consumed, user.id);

        let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.is_email_verified);
        assert!(stored.email_verification.is_none());

        let second = manager.consume(&raw, TokenEffect::VerifyEmail, now).await;
        assert_eq!(second, Err(SessionError::TemporaryTokenInvalidOrExpired));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (users, user) = seeded().await;
        let manager = manager(users);
        let issued_at = Utc::now();

        let raw = manager
            .issue(&user.id, TemporaryTokenKind::PasswordReset, issued_at)
            .await
            .unwrap();

        let too_late = issued_at + Duration::minutes(20) + Duration::seconds(1);
        let effect = TokenEffect::ResetPassword {
            password_hash: "$argon2id$new".to_string(),
        };
        assert_eq!(
            manager.consume(&raw, effect.clone(), too_late).await,
            Err(SessionError::TemporaryTokenInvalidOrExpired)
        );

        let just_in_time = issued_at + Duration::minutes(19) + Duration::seconds(59);
        assert_eq!(
            manager.consume(&raw, effect, just_in_time).await,
            Ok(user.id)
        );
    }

    #[tokio::test]
    async fn test_reissue_replaces_live_token() {
        let (users, user) = seeded().await;
        let manager = manager(users);
        let now = Utc::now();

        let first = manager
            .issue(&user.id, TemporaryTokenKind::EmailVerification, now)
            .await
            .unwrap();
        let second = manager
            .issue(&user.id, TemporaryTokenKind::EmailVerification, now)
            .await
            .unwrap();

        assert_eq!(
            manager.consume(&first, TokenEffect::VerifyEmail, now).await,
            Err(SessionError::TemporaryTokenInvalidOrExpired)
        );
        assert!(manager
            .consume(&second, TokenEffect::VerifyEmail, now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_kinds_do_not_cross() {
        let (users, user) = seeded().await;
        let manager = manager(users);
        let now = Utc::now();

        let raw = manager
            .issue(&user.id, TemporaryTokenKind::EmailVerification, now)
            .await
            .unwrap();

        let effect = TokenEffect::ResetPassword {
            password_hash: "$argon2id$new".to_string(),
        };
        assert_eq!(
            manager.consume(&raw, effect, now).await,
            Err(SessionError::TemporaryTokenInvalidOrExpired)
        );
        assert!(manager
            .holder(TemporaryTokenKind::PasswordReset, &raw, now)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_issue_for_unknown_user() {
        let users = Arc::new(InMemoryUserRepository::new());
        let manager = manager(users);

        let result = manager
            .issue(&UserId::new(), TemporaryTokenKind::PasswordReset, Utc::now())
            .await;
        assert_eq!(result, Err(SessionError::NotFound));
    }
}
