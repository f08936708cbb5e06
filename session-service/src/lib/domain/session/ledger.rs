use std::sync::Arc;

use auth::IssuedToken;
use auth::TokenCodec;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::RotationOutcome;
use crate::domain::session::models::UserId;
use crate::session::errors::SessionError;
use crate::session::ports::RefreshTokenRepository;

/// Result of presenting a refresh token for rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// The presented token was consumed and a successor issued.
    Rotated {
        user_id: UserId,
        refresh: IssuedToken,
    },
    /// The presented token was not LIVE. Every live token of the claimed owner has
    /// been revoked.
    ReuseDetected { user_id: UserId, revoked: u64 },
}

/// Persists one hashed record per issued refresh token, rotates them on use, and
/// detects replay of an already rotated token.
pub struct RefreshTokenLedger<RR>
where
    RR: RefreshTokenRepository,
{
    tokens: Arc<RR>,
    codec: Arc<TokenCodec>,
}

impl<RR> RefreshTokenLedger<RR>
where
    RR: RefreshTokenRepository,
{
    pub fn new(tokens: Arc<RR>, codec: Arc<TokenCodec>) -> Self {
        Self { tokens, codec }
    }

    /// Issue a new LIVE refresh token for a user, starting or extending a family.
    ///
    /// # Errors
    /// * `Internal` - Signing failed
    /// * `TransientStoreFailure` - Store operation failed
    pub async fn issue(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, SessionError> {
        let (issued, record) = self.new_record(user_id, now)?;
        self.tokens.insert(record).await?;

        Ok(issued)
    }

    /// Rotate a presented refresh token.
    ///
    /// The signature is checked first; a forged token is rejected without touching the
    /// ledger. The owner named in the signed claims is the one whose family is revoked
    /// when reuse is detected.
    ///
    /// # Errors
    /// * `TokenInvalid` - Bad signature, shape, or subject
    /// * `RefreshTokenExpired` - The record is live but past its expiry, or it was
    ///   purged and the token's own `exp` has passed
    /// * `TransientStoreFailure` - Store operation failed; nothing was applied
    pub async fn rotate(&self, raw: &str, now: DateTime<Utc>) -> Result<Rotation, SessionError> {
        let claims = self.codec.verify_refresh_signature(raw)?;
        let user_id = UserId::from_string(&claims.sub).map_err(|_| SessionError::TokenInvalid)?;

        let (refresh, successor) = self.new_record(&user_id, now)?;
        let outcome = self
            .tokens
            .rotate(&auth::secret::digest(raw), successor, now)
            .await?;

        match outcome {
            RotationOutcome::Rotated => Ok(Rotation::Rotated { user_id, refresh }),
            RotationOutcome::Expired => Err(SessionError::RefreshTokenExpired),
            // A purged record leaves an authentic token whose own exp has passed.
            RotationOutcome::Missing if claims.exp <= now.timestamp() => {
                tracing::debug!(user_id = %user_id, "Refresh token presented after purge");
                Err(SessionError::RefreshTokenExpired)
            }
            RotationOutcome::Missing | RotationOutcome::NotLive => {
                let revoked = self
                    .tokens
                    .revoke_all(&user_id, RevocationReason::ReuseDetected, now)
                    .await?;

                tracing::warn!(
                    user_id = %user_id,
                    outcome = ?outcome,
                    revoked = revoked,
                    "Refresh token reuse detected, session family revoked"
                );

                Ok(Rotation::ReuseDetected { user_id, revoked })
            }
        }
    }

    /// Revoke the record behind one raw token.
    ///
    /// # Returns
    /// true if a LIVE record transitioned
    pub async fn revoke_one(
        &self,
        raw: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        Ok(self
            .tokens
            .revoke_one(&auth::secret::digest(raw), reason, now)
            .await?)
    }

    /// Revoke every LIVE record of a user.
    pub async fn revoke_all(
        &self,
        user_id: &UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<u64, SessionError> {
        let revoked = self.tokens.revoke_all(user_id, reason, now).await?;
        tracing::debug!(
            user_id = %user_id,
            reason = reason.as_str(),
            revoked = revoked,
            "Refresh tokens revoked"
        );

        Ok(revoked)
    }

    /// Garbage-collect records whose expiry lies more than `grace` before `now`.
    pub async fn purge_expired(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<u64, SessionError> {
        Ok(self.tokens.purge_expired(now - grace).await?)
    }

    fn new_record(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(IssuedToken, RefreshTokenRecord), SessionError> {
        let issued = self.codec.issue_refresh_token(&user_id.to_string(), now)?;
        let record = RefreshTokenRecord::new(
            *user_id,
            auth::secret::digest(&issued.token),
            issued.expires_at,
            now,
        );

        Ok((issued, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::models::RefreshTokenState;
    use crate::outbound::repositories::memory::InMemoryRefreshTokenRepository;

    fn ledger() -> (
        Arc<InMemoryRefreshTokenRepository>,
        RefreshTokenLedger<InMemoryRefreshTokenRepository>,
    ) {
        let tokens = Arc::new(InMemoryRefreshTokenRepository::new());
        let codec = Arc::new(TokenCodec::new(
            b"access_secret_key_at_least_32_bytes!",
            b"refresh_secret_key_at_least_32_bytes",
        ));
        (tokens.clone(), RefreshTokenLedger::new(tokens, codec))
    }

    async fn state_of(tokens: &InMemoryRefreshTokenRepository, raw: &str) -> RefreshTokenState {
        tokens
            .find_by_digest(&auth::secret::digest(raw))
            .await
            .unwrap()
            .expect("record should exist")
            .state()
    }

    fn rotated_token(rotation: Rotation) -> String {
        match rotation {
            Rotation::Rotated { refresh, .. } => refresh.token,
            other => panic!("expected rotation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_issue_stores_digest_only() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();

        let issued = ledger.issue(&user_id, now).await.unwrap();

        let record = tokens
            .find_by_digest(&auth::secret::digest(&issued.token))
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(record.user_id, user_id);
        assert_ne!(record.token_digest, issued.token);
        assert_eq!(record.expires_at, issued.expires_at);
        assert_eq!(
            record.expires_at.timestamp(),
            (now + Duration::days(7)).timestamp()
        );
        assert_eq!(record.state(), RefreshTokenState::Live);
    }

    #[tokio::test]
    async fn test_rotate_consumes_presented_token() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();
        let first = ledger.issue(&user_id, now).await.unwrap();

        let second = rotated_token(ledger.rotate(&first.token, now).await.unwrap());

        assert_ne!(first.token, second);
        assert_eq!(state_of(&tokens, &first.token).await, RefreshTokenState::Rotated);
        assert_eq!(state_of(&tokens, &second).await, RefreshTokenState::Live);
    }

    #[tokio::test]
    async fn test_replay_revokes_family() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();
        let first = ledger.issue(&user_id, now).await.unwrap();
        let second = rotated_token(ledger.rotate(&first.token, now).await.unwrap());

        let replay = ledger.rotate(&first.token, now).await.unwrap();
        assert_eq!(
            replay,
            Rotation::ReuseDetected {
                user_id,
                revoked: 1
            }
        );
        assert_eq!(state_of(&tokens, &second).await, RefreshTokenState::Revoked);

        let latest = ledger.rotate(&second, now).await.unwrap();
        assert!(matches!(latest, Rotation::ReuseDetected { revoked: 0, .. }));
    }

    #[tokio::test]
    async fn test_unknown_but_signed_token_is_reuse() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();
        let live = ledger.issue(&user_id, now).await.unwrap();

        let codec = TokenCodec::new(
            b"access_secret_key_at_least_32_bytes!",
            b"refresh_secret_key_at_least_32_bytes",
        );
        let unknown = codec.issue_refresh_token(&user_id.to_string(), Utc::now()).unwrap();

        let result = ledger.rotate(&unknown.token, now).await.unwrap();
        assert!(matches!(result, Rotation::ReuseDetected { revoked: 1, .. }));
        assert_eq!(state_of(&tokens, &live.token).await, RefreshTokenState::Revoked);
    }

    #[tokio::test]
    async fn test_forged_token_touches_nothing() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();
        let live = ledger.issue(&user_id, now).await.unwrap();

        let forger = TokenCodec::new(
            b"access_secret_key_at_least_32_bytes!",
            b"some_other_refresh_secret_32_bytes!!",
        );
        let forged = forger.issue_refresh_token(&user_id.to_string(), Utc::now()).unwrap();

        assert_eq!(
            ledger.rotate(&forged.token, now).await,
            Err(SessionError::TokenInvalid)
        );
        assert_eq!(state_of(&tokens, &live.token).await, RefreshTokenState::Live);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_a_reuse_signal() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let issued_at = Utc::now();
        let first = ledger.issue(&user_id, issued_at).await.unwrap();

        let later = issued_at + Duration::days(7) + Duration::seconds(1);
        assert_eq!(
            ledger.rotate(&first.token, later).await,
            Err(SessionError::RefreshTokenExpired)
        );
        assert_eq!(state_of(&tokens, &first.token).await, RefreshTokenState::Live);
    }

    #[tokio::test]
    async fn test_purged_expired_token_does_not_revoke_family() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let issued_at = Utc::now();
        let stale = ledger.issue(&user_id, issued_at).await.unwrap();

        let later = issued_at + Duration::days(38);
        ledger
            .purge_expired(later, Duration::days(30))
            .await
            .unwrap();
        let fresh = ledger.issue(&user_id, later).await.unwrap();

        assert_eq!(
            ledger.rotate(&stale.token, later).await,
            Err(SessionError::RefreshTokenExpired)
        );
        assert_eq!(state_of(&tokens, &fresh.token).await, RefreshTokenState::Live);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_one_winner() {
        let (_, ledger) = ledger();
        let ledger = Arc::new(ledger);
        let user_id = UserId::new();
        let now = Utc::now();
        let first = ledger.issue(&user_id, now).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let token = first.token.clone();
            handles.push(tokio::spawn(async move { ledger.rotate(&token, now).await }));
        }

        let mut winners = 0;
        let mut reuses = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Rotation::Rotated { .. } => winners += 1,
                Rotation::ReuseDetected { .. } => reuses += 1,
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(reuses, 7);
    }

    #[tokio::test]
    async fn test_revoke_one_is_idempotent() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let now = Utc::now();
        let issued = ledger.issue(&user_id, now).await.unwrap();

        assert!(ledger
            .revoke_one(&issued.token, RevocationReason::Logout, now)
            .await
            .unwrap());
        assert!(!ledger
            .revoke_one(&issued.token, RevocationReason::Logout, now)
            .await
            .unwrap());

        let record = tokens
            .find_by_digest(&auth::secret::digest(&issued.token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.revoked_reason, Some(RevocationReason::Logout));
    }

    #[tokio::test]
    async fn test_purge_respects_grace_window() {
        let (tokens, ledger) = ledger();
        let user_id = UserId::new();
        let issued_at = Utc::now();
        let issued = ledger.issue(&user_id, issued_at).await.unwrap();

        let within_grace = issued_at + Duration::days(7) + Duration::days(1);
        assert_eq!(
            ledger
                .purge_expired(within_grace, Duration::days(30))
                .await
                .unwrap(),
            0
        );

        let past_grace = issued_at + Duration::days(7) + Duration::days(31);
        assert_eq!(
            ledger
                .purge_expired(past_grace, Duration::days(30))
                .await
                .unwrap(),
            1
        );
        assert!(tokens
            .find_by_digest(&auth::secret::digest(&issued.token))
            .await
            .unwrap()
            .is_none());
    }
}
