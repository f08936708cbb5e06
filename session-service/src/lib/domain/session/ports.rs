use async_trait::async_trait;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::session::events::SessionEvent;
use crate::domain::session::models::AuthSession;
use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::ExternalIdentity;
use crate::domain::session::models::Identity;
use crate::domain::session::models::Password;
use crate::domain::session::models::Provider;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::Role;
use crate::domain::session::models::RotationOutcome;
use crate::domain::session::models::SessionTokens;
use crate::domain::session::models::TemporaryToken;
use crate::domain::session::models::TemporaryTokenKind;
use crate::domain::session::models::TokenEffect;
use crate::domain::session::models::User;
use crate::domain::session::models::UserId;
use crate::domain::session::models::Username;
use crate::session::errors::EventPublisherError;
use crate::session::errors::MailerError;
use crate::session::errors::SessionError;
use crate::session::errors::StoreError;

/// Port for the session lifecycle façade. The routing layer talks only to this.
#[async_trait]
pub trait SessionServicePort: Send + Sync + 'static {
    /// Register a password-based account and open its first session.
    ///
    /// A verification email is dispatched as a side effect.
    ///
    /// # Errors
    /// * `DuplicateEmailOrUsername` - Email or username is taken
    /// * `TransientStoreFailure` - Store operation failed
    async fn register(&self, command: RegisterCommand) -> Result<AuthSession, SessionError>;

    /// Authenticate by email or username and password.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown identifier, wrong password, or no password set
    /// * `AccountInactive` - Account is disabled
    /// * `CorruptCredential` - Stored password digest is malformed
    async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession, SessionError>;

    /// Rotate a refresh token into a new access/refresh pair.
    ///
    /// # Errors
    /// * `TokenInvalid` - Bad signature or shape
    /// * `RefreshReuseDetected` - Token was already rotated or revoked; family revoked
    /// * `RefreshTokenExpired` - Token is past its expiry
    /// * `AccountInactive` - Account was disabled since the token was issued
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError>;

    /// Revoke one refresh token. Revoking an already revoked token is a no-op.
    ///
    /// # Errors
    /// * `TokenInvalid` - Bad signature or shape
    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError>;

    /// Revoke every live refresh token of the caller.
    async fn logout_all(&self, identity: &Identity) -> Result<u64, SessionError>;

    /// Consume an email-verification token and mark the owner verified.
    ///
    /// # Errors
    /// * `TemporaryTokenInvalidOrExpired` - No live token matches
    async fn verify_email(&self, token: &str) -> Result<(), SessionError>;

    /// Issue a fresh email-verification token, replacing any live one.
    ///
    /// # Errors
    /// * `NotFound` - Caller no longer exists
    /// * `EmailAlreadyVerified` - Nothing to verify
    async fn resend_email_verification(&self, identity: &Identity) -> Result<(), SessionError>;

    /// Issue a password-reset token out-of-band. Unknown emails succeed silently.
    ///
    /// # Errors
    /// * `InvalidEmail` - Malformed address
    async fn forgot_password(&self, email: &str) -> Result<(), SessionError>;

    /// Consume a password-reset token and set a new password. Revokes all sessions.
    ///
    /// # Errors
    /// * `TemporaryTokenInvalidOrExpired` - No live token matches
    /// * `SamePassword` - New password equals the current one (token is not consumed)
    async fn reset_password(&self, token: &str, new_password: Password)
        -> Result<(), SessionError>;

    /// Change the caller's password, revoke all sessions, and open a new one.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Old password is wrong or account has no password
    /// * `SamePassword` - New password equals the current one
    async fn change_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: Password,
    ) -> Result<SessionTokens, SessionError>;

    /// Resolve a federated identity to a local account and open a session.
    ///
    /// # Errors
    /// * `IdentityProviderConflict` - Email belongs to an account with another login type
    /// * `MissingProviderEmail` - Provider did not share an email address
    /// * `AccountInactive` - Account is disabled
    async fn oauth_callback(
        &self,
        provider: Provider,
        profile: ExternalIdentity,
    ) -> Result<AuthSession, SessionError>;

    /// Change the role of a user. Admin only. Revokes the target's sessions on change.
    ///
    /// # Errors
    /// * `InsufficientRole` - Caller is not an admin; nothing is mutated
    /// * `NotFound` - Target user does not exist
    async fn assign_role(
        &self,
        caller: &Identity,
        target: &UserId,
        role: Role,
    ) -> Result<User, SessionError>;

    /// Load the caller's account.
    ///
    /// # Errors
    /// * `NotFound` - Caller no longer exists
    async fn current_user(&self, identity: &Identity) -> Result<User, SessionError>;

    /// Verify an access token and resolve the explicit caller identity.
    ///
    /// # Errors
    /// * `TokenExpired` - Token is authentic but expired
    /// * `TokenInvalid` - Bad signature, shape, or claims
    fn authenticate(&self, access_token: &str) -> Result<Identity, SessionError>;

    /// Delete refresh-token records whose expiry lies more than `grace` in the past.
    async fn purge_expired_refresh_tokens(&self, grace: Duration) -> Result<u64, SessionError>;
}

/// Persistence operations for the user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `Conflict` - Email, username, or provider identity already exists
    /// * `Transient` - Store operation failed
    async fn create(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError>;

    /// Stamp a successful login.
    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Replace the password digest and revoke every live refresh token of the user
    /// with `password_changed`, in one write.
    ///
    /// # Returns
    /// Number of refresh tokens revoked, or None if the user does not exist
    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u64>, StoreError>;

    /// Replace the role and revoke every live refresh token of the user with
    /// `role_changed`, in one write.
    ///
    /// # Returns
    /// Updated user, or None if the user does not exist
    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Store a temporary-token digest, replacing any token of the same kind.
    ///
    /// # Returns
    /// false if the user does not exist
    async fn store_temporary_token(
        &self,
        id: &UserId,
        kind: TemporaryTokenKind,
        token: &TemporaryToken,
    ) -> Result<bool, StoreError>;

    /// Find the user holding a live temporary token with this digest.
    async fn find_by_temporary_token(
        &self,
        kind: TemporaryTokenKind,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Atomically consume a live temporary token and apply its effect.
    ///
    /// Clearing the token and applying the effect happen in one write, so two
    /// concurrent consumers cannot both succeed. A password reset also revokes every
    /// live refresh token of the owner with `password_changed` in that write.
    ///
    /// # Returns
    /// Owner of the consumed token, or None if no live token matched
    async fn consume_temporary_token(
        &self,
        digest: &str,
        effect: &TokenEffect,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError>;
}

/// Persistence operations for the refresh-token ledger.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + 'static {
    /// Insert a new LIVE record.
    ///
    /// # Errors
    /// * `Conflict` - Digest already present
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    async fn find_by_digest(&self, digest: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Atomically rotate the record matching `digest` into `successor`.
    ///
    /// Only a LIVE, unexpired record is flipped to ROTATED, and only then is the
    /// successor inserted. Concurrent callers are linearized: exactly one observes
    /// `Rotated`, the rest observe `NotLive`.
    async fn rotate(
        &self,
        digest: &str,
        successor: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError>;

    /// Revoke the LIVE record matching `digest`.
    ///
    /// # Returns
    /// true if a record transitioned, false if none was LIVE
    async fn revoke_one(
        &self,
        digest: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Revoke every LIVE record of a user.
    ///
    /// # Returns
    /// Number of records that transitioned
    async fn revoke_all(
        &self,
        user_id: &UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Delete records that expired before `cutoff`.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Event publishing for domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// Publish a session lifecycle event.
    ///
    /// # Errors
    /// * `SerializationFailed` - Event serialization failed
    /// * `PublishFailed` - Delivery failed
    async fn publish(&self, event: &SessionEvent) -> Result<(), EventPublisherError>;
}

/// Outbound delivery of temporary-token links.
///
/// The raw secret is handed over as is. `name` is the greeting name of the recipient.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send_email_verification(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError>;

    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError>;
}

/// Source of the current instant for expiry decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}
