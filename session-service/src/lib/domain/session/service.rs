use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenCodec;
use chrono::Duration;

use crate::domain::session::events::SessionEvent;
use crate::domain::session::events::SessionEventKind;
use crate::domain::session::identity::IdentityResolver;
use crate::domain::session::ledger::RefreshTokenLedger;
use crate::domain::session::ledger::Rotation;
use crate::domain::session::models::AuthSession;
use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::ExternalIdentity;
use crate::domain::session::models::Identity;
use crate::domain::session::models::LoginType;
use crate::domain::session::models::Password;
use crate::domain::session::models::Provider;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::Role;
use crate::domain::session::models::SessionTokens;
use crate::domain::session::models::TemporaryTokenKind;
use crate::domain::session::models::TokenEffect;
use crate::domain::session::models::User;
use crate::domain::session::models::UserId;
use crate::domain::session::models::Username;
use crate::domain::session::temporary::TemporaryTokenManager;
use crate::domain::session::temporary::DEFAULT_TEMPORARY_TOKEN_TTL_MINUTES;
use crate::session::errors::SessionError;
use crate::session::ports::Clock;
use crate::session::ports::EventPublisher;
use crate::session::ports::Mailer;
use crate::session::ports::RefreshTokenRepository;
use crate::session::ports::SessionServicePort;
use crate::session::ports::UserRepository;

/// Settings for temporary-token issuance.
#[derive(Debug, Clone)]
pub struct TemporaryTokenSettings {
    pub pepper: Vec<u8>,
    pub ttl: Duration,
}

impl TemporaryTokenSettings {
    pub fn new(pepper: &[u8]) -> Self {
        Self {
            pepper: pepper.to_vec(),
            ttl: Duration::minutes(DEFAULT_TEMPORARY_TOKEN_TTL_MINUTES),
        }
    }
}

/// Domain service implementation for session operations.
///
/// Orchestrates password hashing, token signing, the refresh-token ledger, temporary
/// tokens and identity resolution. Holds no cross-request mutable state.
pub struct SessionService<UR, RR, EP, ML, CL>
where
    UR: UserRepository,
    RR: RefreshTokenRepository,
    EP: EventPublisher,
    ML: Mailer,
    CL: Clock,
{
    users: Arc<UR>,
    ledger: RefreshTokenLedger<RR>,
    temporary_tokens: TemporaryTokenManager<UR>,
    identities: IdentityResolver<UR>,
    codec: Arc<TokenCodec>,
    password_hasher: PasswordHasher,
    event_publisher: Arc<EP>,
    mailer: Arc<ML>,
    clock: Arc<CL>,
}

impl<UR, RR, EP, ML, CL> SessionService<UR, RR, EP, ML, CL>
where
    UR: UserRepository,
    RR: RefreshTokenRepository,
    EP: EventPublisher,
    ML: Mailer,
    CL: Clock,
{
    /// Create a new session service with injected dependencies.
    ///
    /// # Arguments
    /// * `users` - User persistence implementation
    /// * `refresh_tokens` - Refresh-token ledger persistence implementation
    /// * `event_publisher` - Domain event publishing implementation
    /// * `mailer` - Out-of-band delivery of temporary-token links
    /// * `clock` - Source of the current instant
    /// * `codec` - Access/refresh token signer
    /// * `temporary` - Temporary-token pepper and lifetime
    pub fn new(
        users: Arc<UR>,
        refresh_tokens: Arc<RR>,
        event_publisher: Arc<EP>,
        mailer: Arc<ML>,
        clock: Arc<CL>,
        codec: TokenCodec,
        temporary: TemporaryTokenSettings,
    ) -> Self {
        let codec = Arc::new(codec);

        Self {
            ledger: RefreshTokenLedger::new(refresh_tokens, Arc::clone(&codec)),
            temporary_tokens: TemporaryTokenManager::new(
                Arc::clone(&users),
                &temporary.pepper,
                temporary.ttl,
            ),
            identities: IdentityResolver::new(Arc::clone(&users)),
            users,
            codec,
            password_hasher: PasswordHasher::new(),
            event_publisher,
            mailer,
            clock,
        }
    }

    async fn issue_session(&self, user: &User) -> Result<SessionTokens, SessionError> {
        let now = self.clock.now();
        let access = self
            .codec
            .issue_access_token(&user.id.to_string(), user.role.as_str(), now)?;
        let refresh = self.ledger.issue(&user.id, now).await?;

        Ok(SessionTokens {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    async fn load_user(&self, user_id: &UserId) -> Result<User, SessionError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::NotFound)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, SessionError> {
        let identifier = identifier.trim();

        if identifier.contains('@') {
            match EmailAddress::new(identifier.to_string()) {
                Ok(email) => Ok(self.users.find_by_email(&email).await?),
                Err(_) => Ok(None),
            }
        } else {
            match Username::new(identifier.to_string()) {
                Ok(username) => Ok(self.users.find_by_username(&username).await?),
                Err(_) => Ok(None),
            }
        }
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, SessionError> {
        Ok(self.password_hasher.verify(password, hash)?)
    }

    /// Spend one Argon2 derivation so a login without a stored digest takes as long
    /// as a failed verification.
    fn reject_without_digest(&self, password: &str) -> SessionError {
        let _ = self.password_hasher.hash(password);
        SessionError::InvalidCredentials
    }

    async fn send_verification(&self, user: &User) -> Result<(), SessionError> {
        let raw = self
            .temporary_tokens
            .issue(
                &user.id,
                TemporaryTokenKind::EmailVerification,
                self.clock.now(),
            )
            .await?;

        if let Err(e) = self
            .mailer
            .send_email_verification(&user.email, display_name(user), &raw)
            .await
        {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        Ok(())
    }

    async fn publish(&self, user_id: UserId, kind: SessionEventKind) {
        let event = SessionEvent::new(user_id, kind, self.clock.now());
        if let Err(e) = self.event_publisher.publish(&event).await {
            tracing::error!(
                event_type = event.event_type(),
                user_id = %user_id,
                error = %e,
                "Failed to publish session event"
            );
        }
    }
}

fn display_name(user: &User) -> &str {
    user.username
        .as_ref()
        .map(Username::as_str)
        .unwrap_or_else(|| user.email.local_part())
}

#[async_trait]
impl<UR, RR, EP, ML, CL> SessionServicePort for SessionService<UR, RR, EP, ML, CL>
where
    UR: UserRepository,
    RR: RefreshTokenRepository,
    EP: EventPublisher,
    ML: Mailer,
    CL: Clock,
{
    async fn register(&self, command: RegisterCommand) -> Result<AuthSession, SessionError> {
        let password_hash = self.password_hasher.hash(command.password.as_str())?;
        let user = User::with_password(
            command.email,
            command.username,
            password_hash,
            self.clock.now(),
        );

        let user = self.users.create(user).await?;
        tracing::info!(user_id = %user.id, "User registered");

        self.send_verification(&user).await?;
        let tokens = self.issue_session(&user).await?;

        self.publish(
            user.id,
            SessionEventKind::UserRegistered {
                login_type: user.login_type,
            },
        )
        .await;

        Ok(AuthSession { user, tokens })
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession, SessionError> {
        let Some(mut user) = self.find_by_identifier(identifier).await? else {
            return Err(self.reject_without_digest(password));
        };

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(self.reject_without_digest(password));
        };
        if !self.verify_password(password, hash)? {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(SessionError::AccountInactive);
        }

        let now = self.clock.now();
        self.users.record_login(&user.id, now).await?;
        user.last_login_at = Some(now);

        let tokens = self.issue_session(&user).await?;
        self.publish(user.id, SessionEventKind::LoggedIn).await;

        Ok(AuthSession { user, tokens })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError> {
        let now = self.clock.now();

        let (user_id, refresh) = match self.ledger.rotate(refresh_token, now).await? {
            Rotation::Rotated { user_id, refresh } => (user_id, refresh),
            Rotation::ReuseDetected { user_id, revoked } => {
                self.publish(
                    user_id,
                    SessionEventKind::RefreshReuseDetected {
                        revoked_sessions: revoked,
                    },
                )
                .await;
                return Err(SessionError::RefreshReuseDetected);
            }
        };

        let user = match self.users.find_by_id(&user_id).await? {
            Some(user) => user,
            None => {
                self.ledger
                    .revoke_all(&user_id, RevocationReason::AccountInactive, now)
                    .await?;
                return Err(SessionError::TokenInvalid);
            }
        };

        if !user.is_active {
            self.ledger
                .revoke_all(&user_id, RevocationReason::AccountInactive, now)
                .await?;
            return Err(SessionError::AccountInactive);
        }

        // Role is re-resolved from the store on every rotation.
        let access = self
            .codec
            .issue_access_token(&user.id.to_string(), user.role.as_str(), now)?;

        self.publish(user.id, SessionEventKind::TokenRefreshed).await;

        Ok(SessionTokens {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        let claims = self.codec.verify_refresh_signature(refresh_token)?;

        let revoked = self
            .ledger
            .revoke_one(refresh_token, RevocationReason::Logout, self.clock.now())
            .await?;

        if revoked {
            if let Ok(user_id) = UserId::from_string(&claims.sub) {
                self.publish(user_id, SessionEventKind::LoggedOut).await;
            }
        }

        Ok(())
    }

    async fn logout_all(&self, identity: &Identity) -> Result<u64, SessionError> {
        let revoked = self
            .ledger
            .revoke_all(
                &identity.user_id,
                RevocationReason::LogoutAll,
                self.clock.now(),
            )
            .await?;

        self.publish(
            identity.user_id,
            SessionEventKind::LoggedOutEverywhere {
                revoked_sessions: revoked,
            },
        )
        .await;

        Ok(revoked)
    }

    async fn verify_email(&self, token: &str) -> Result<(), SessionError> {
        let user_id = self
            .temporary_tokens
            .consume(token, TokenEffect::VerifyEmail, self.clock.now())
            .await?;

        tracing::info!(user_id = %user_id, "Email verified");
        self.publish(user_id, SessionEventKind::EmailVerified).await;

        Ok(())
    }

    async fn resend_email_verification(&self, identity: &Identity) -> Result<(), SessionError> {
        let user = self.load_user(&identity.user_id).await?;
        if user.is_email_verified {
            return Err(SessionError::EmailAlreadyVerified);
        }

        self.send_verification(&user).await?;
        self.publish(user.id, SessionEventKind::VerificationResent)
            .await;

        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), SessionError> {
        let email = EmailAddress::new(email.to_string())?;

        let user = match self.users.find_by_email(&email).await? {
            Some(user) if user.login_type == LoginType::Password => user,
            _ => {
                tracing::debug!("Password reset requested for unknown or federated account");
                return Ok(());
            }
        };

        let raw = self
            .temporary_tokens
            .issue(&user.id, TemporaryTokenKind::PasswordReset, self.clock.now())
            .await?;

        if let Err(e) = self
            .mailer
            .send_password_reset(&user.email, display_name(&user), &raw)
            .await
        {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
        }

        self.publish(user.id, SessionEventKind::PasswordResetRequested)
            .await;

        Ok(())
    }

    async fn reset_password(
        &self,
        token: &str,
        new_password: Password,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let holder = self
            .temporary_tokens
            .holder(TemporaryTokenKind::PasswordReset, token, now)
            .await?;

        if let Some(current) = holder.password_hash.as_deref() {
            if self.verify_password(new_password.as_str(), current)? {
                return Err(SessionError::SamePassword);
            }
        }

        let password_hash = self.password_hasher.hash(new_password.as_str())?;
        // The store revokes the refresh-token family in the same write.
        let user_id = self
            .temporary_tokens
            .consume(token, TokenEffect::ResetPassword { password_hash }, now)
            .await?;

        tracing::info!(user_id = %user_id, "Password reset completed");
        self.publish(user_id, SessionEventKind::PasswordResetCompleted)
            .await;

        Ok(())
    }

    async fn change_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: Password,
    ) -> Result<SessionTokens, SessionError> {
        let user = self.load_user(&identity.user_id).await?;
        let current = user
            .password_hash
            .as_deref()
            .ok_or(SessionError::InvalidCredentials)?;

        if !self.verify_password(old_password, current)? {
            return Err(SessionError::InvalidCredentials);
        }
        if self.verify_password(new_password.as_str(), current)? {
            return Err(SessionError::SamePassword);
        }

        let now = self.clock.now();
        let password_hash = self.password_hasher.hash(new_password.as_str())?;
        let revoked = self
            .users
            .update_password(&user.id, &password_hash, now)
            .await?
            .ok_or(SessionError::NotFound)?;
        let tokens = self.issue_session(&user).await?;

        tracing::info!(user_id = %user.id, revoked = revoked, "Password changed");
        self.publish(user.id, SessionEventKind::PasswordChanged).await;

        Ok(tokens)
    }

    async fn oauth_callback(
        &self,
        provider: Provider,
        profile: ExternalIdentity,
    ) -> Result<AuthSession, SessionError> {
        let now = self.clock.now();
        let resolved = self.identities.resolve(provider, &profile, now).await?;
        let mut user = resolved.user;

        if !user.is_active {
            return Err(SessionError::AccountInactive);
        }

        self.users.record_login(&user.id, now).await?;
        user.last_login_at = Some(now);

        let tokens = self.issue_session(&user).await?;

        if resolved.created {
            self.publish(
                user.id,
                SessionEventKind::UserRegistered {
                    login_type: user.login_type,
                },
            )
            .await;
        }
        self.publish(
            user.id,
            SessionEventKind::OAuthLogin {
                login_type: user.login_type,
            },
        )
        .await;

        Ok(AuthSession { user, tokens })
    }

    async fn assign_role(
        &self,
        caller: &Identity,
        target: &UserId,
        role: Role,
    ) -> Result<User, SessionError> {
        if caller.role != Role::Admin {
            tracing::warn!(caller = %caller.user_id, target = %target, "Role change denied");
            return Err(SessionError::InsufficientRole);
        }

        // The token's role may be stale; the store is authoritative.
        match self.users.find_by_id(&caller.user_id).await? {
            Some(admin) if admin.role == Role::Admin && admin.is_active => {}
            _ => {
                tracing::warn!(caller = %caller.user_id, target = %target, "Role change denied");
                return Err(SessionError::InsufficientRole);
            }
        }

        let current = self.load_user(target).await?;
        if current.role == role {
            return Ok(current);
        }

        let now = self.clock.now();
        let updated = self
            .users
            .update_role(target, role, now)
            .await?
            .ok_or(SessionError::NotFound)?;

        tracing::info!(
            target = %target,
            from = current.role.as_str(),
            to = role.as_str(),
            changed_by = %caller.user_id,
            "Role changed"
        );
        self.publish(
            *target,
            SessionEventKind::RoleChanged {
                from: current.role,
                to: role,
                changed_by: caller.user_id,
            },
        )
        .await;

        Ok(updated)
    }

    async fn current_user(&self, identity: &Identity) -> Result<User, SessionError> {
        self.load_user(&identity.user_id).await
    }

    fn authenticate(&self, access_token: &str) -> Result<Identity, SessionError> {
        let claims = self.codec.verify_access(access_token)?;
        let user_id = UserId::from_string(&claims.sub).map_err(|_| SessionError::TokenInvalid)?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| SessionError::TokenInvalid)?;

        Ok(Identity { user_id, role })
    }

    async fn purge_expired_refresh_tokens(&self, grace: Duration) -> Result<u64, SessionError> {
        let purged = self.ledger.purge_expired(self.clock.now(), grace).await?;
        if purged > 0 {
            tracing::info!(purged = purged, "Expired refresh tokens purged");
        }

        Ok(purged)
    }
}
