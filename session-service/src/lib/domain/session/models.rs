use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::session::errors::EmailError;
use crate::session::errors::PasswordPolicyError;
use crate::session::errors::ProviderError;
use crate::session::errors::RoleError;
use crate::session::errors::UserIdError;
use crate::session::errors::UsernameError;

/// User aggregate entity.
///
/// Holds the credential state of an account, including the two temporary-token slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub username: Option<Username>,
    /// Present only for password-based accounts
    pub password_hash: Option<String>,
    pub login_type: LoginType,
    /// Set iff `login_type` is not `Password`
    pub provider_id: Option<String>,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub email_verification: Option<TemporaryToken>,
    pub password_reset: Option<TemporaryToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh password-based account.
    pub fn with_password(
        email: EmailAddress,
        username: Username,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            username: Some(username),
            password_hash: Some(password_hash),
            login_type: LoginType::Password,
            provider_id: None,
            role: Role::User,
            avatar_url: None,
            is_email_verified: false,
            is_active: true,
            last_login_at: None,
            email_verification: None,
            password_reset: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a fresh federated account. The provider has already verified the email.
    pub fn with_provider(
        provider: Provider,
        identity: &ExternalIdentity,
        email: EmailAddress,
        username: Username,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            username: Some(username),
            password_hash: None,
            login_type: provider.into(),
            provider_id: Some(identity.provider_id.clone()),
            role: Role::User,
            avatar_url: identity.avatar_url.clone(),
            is_email_verified: true,
            is_active: true,
            last_login_at: None,
            email_verification: None,
            password_reset: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Temporary-token slot of the given kind.
    pub fn temporary_token(&self, kind: TemporaryTokenKind) -> Option<&TemporaryToken> {
        match kind {
            TemporaryTokenKind::EmailVerification => self.email_verification.as_ref(),
            TemporaryTokenKind::PasswordReset => self.password_reset.as_ref(),
        }
    }

    pub fn temporary_token_mut(&mut self, kind: TemporaryTokenKind) -> &mut Option<TemporaryToken> {
        match kind {
            TemporaryTokenKind::EmailVerification => &mut self.email_verification,
            TemporaryTokenKind::PasswordReset => &mut self.password_reset,
        }
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Arguments
    /// * `s` - UUID string to parse
    ///
    /// # Returns
    /// Parsed UserId
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// Ensures username is 3-50 characters and contains only alphanumeric, underscore,
/// hyphen, and dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 50;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `TooShort` - Username shorter than 3 characters
    /// * `TooLong` - Username longer than 50 characters
    /// * `InvalidCharacters` - Contains characters other than alphanumerics, `_`, `-`, `.`
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let username = Self::with_valid_length(username)?;
        let username = Self::with_valid_chars(username)?;
        Ok(Self(username))
    }

    fn with_valid_length(username: String) -> Result<String, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(username)
        }
    }

    fn with_valid_chars(username: String) -> Result<String, UsernameError> {
        if username.chars().all(Self::is_allowed_char) {
            Ok(username)
        } else {
            Err(UsernameError::InvalidCharacters)
        }
    }

    fn is_allowed_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
    }

    /// Derive a username candidate from the local part of an email address.
    ///
    /// Disallowed characters are dropped, the result is truncated to leave room for a
    /// disambiguating suffix, and padded when it would be too short.
    pub fn from_email_local_part(email: &EmailAddress, suffix: Option<&str>) -> Self {
        const SUFFIX_ROOM: usize = 8;

        let mut base: String = email
            .local_part()
            .chars()
            .filter(|c| Self::is_allowed_char(*c))
            .take(Self::MAX_LENGTH - SUFFIX_ROOM)
            .collect();

        while base.chars().count() < Self::MIN_LENGTH {
            base.push('_');
        }

        match suffix {
            Some(suffix) => {
                let suffix: String = suffix
                    .chars()
                    .filter(|c| Self::is_allowed_char(*c))
                    .take(SUFFIX_ROOM - 1)
                    .collect();
                Self(format!("{}-{}", base, suffix))
            }
            None => Self(base),
        }
    }

    /// Get username as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser. Stored trimmed and
/// lower-cased so uniqueness holds regardless of how the address was typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        let email = email.trim().to_lowercase();
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Part of the address before the `@`.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plaintext password that satisfies the password policy.
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    const SYMBOLS: &'static str = "@$!%*?&";

    /// Validate a candidate password against the policy.
    ///
    /// # Errors
    /// * `TooShort` - Fewer than 8 characters
    /// * `MissingLowercase` / `MissingUppercase` / `MissingDigit` / `MissingSymbol`
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        if password.chars().count() < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        if !password.chars().any(|c| Self::SYMBOLS.contains(c)) {
            return Err(PasswordPolicyError::MissingSymbol);
        }

        Ok(Self(password))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Authorization role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account authenticates. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginType {
    Password,
    Google,
    Github,
}

impl LoginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginType::Password => "password",
            LoginType::Google => "google",
            LoginType::Github => "github",
        }
    }
}

impl FromStr for LoginType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(LoginType::Password),
            "google" => Ok(LoginType::Google),
            "github" => Ok(LoginType::Github),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        LoginType::from(*self).as_str()
    }
}

impl From<Provider> for LoginType {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Google => LoginType::Google,
            Provider::Github => LoginType::Github,
        }
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

/// Normalized profile handed over by a provider adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: Option<String>,
    pub provider_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Explicit identity of an authenticated caller, resolved from an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

/// Kinds of single-use temporary token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporaryTokenKind {
    EmailVerification,
    PasswordReset,
}

impl TemporaryTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporaryTokenKind::EmailVerification => "email_verification",
            TemporaryTokenKind::PasswordReset => "password_reset",
        }
    }
}

/// Stored half of a temporary token. The raw secret is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryToken {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl TemporaryToken {
    /// Live strictly before `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// State change authorized by consuming a temporary token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEffect {
    VerifyEmail,
    ResetPassword { password_hash: String },
}

impl TokenEffect {
    pub fn kind(&self) -> TemporaryTokenKind {
        match self {
            TokenEffect::VerifyEmail => TemporaryTokenKind::EmailVerification,
            TokenEffect::ResetPassword { .. } => TemporaryTokenKind::PasswordReset,
        }
    }
}

/// Why a refresh-token record was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    Rotated,
    ReuseDetected,
    Logout,
    LogoutAll,
    RoleChanged,
    PasswordChanged,
    AccountInactive,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Rotated => "rotated",
            RevocationReason::ReuseDetected => "reuse_detected",
            RevocationReason::Logout => "logout",
            RevocationReason::LogoutAll => "logout_all",
            RevocationReason::RoleChanged => "role_changed",
            RevocationReason::PasswordChanged => "password_changed",
            RevocationReason::AccountInactive => "account_inactive",
        }
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotated" => Ok(RevocationReason::Rotated),
            "reuse_detected" => Ok(RevocationReason::ReuseDetected),
            "logout" => Ok(RevocationReason::Logout),
            "logout_all" => Ok(RevocationReason::LogoutAll),
            "role_changed" => Ok(RevocationReason::RoleChanged),
            "password_changed" => Ok(RevocationReason::PasswordChanged),
            "account_inactive" => Ok(RevocationReason::AccountInactive),
            other => Err(format!("unknown revocation reason: {}", other)),
        }
    }
}

/// Ledger state of a refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Live,
    Rotated,
    Revoked,
}

/// One issued refresh token. Only the digest of the raw token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub token_digest: String,
    pub revoked: bool,
    pub revoked_reason: Option<RevocationReason>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(
        user_id: UserId,
        token_digest: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_digest,
            revoked: false,
            revoked_reason: None,
            revoked_at: None,
            expires_at,
            created_at: now,
        }
    }

    pub fn state(&self) -> RefreshTokenState {
        match (self.revoked, self.revoked_reason) {
            (false, _) => RefreshTokenState::Live,
            (true, Some(RevocationReason::Rotated)) => RefreshTokenState::Rotated,
            (true, _) => RefreshTokenState::Revoked,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Flip to revoked. A revoked record is never un-revoked.
    pub fn revoke(&mut self, reason: RevocationReason, now: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_reason = Some(reason);
        self.revoked_at = Some(now);
        true
    }
}

/// Outcome of an atomic rotation attempt against the ledger store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The presented record flipped LIVE -> ROTATED and the successor was inserted.
    Rotated,
    /// No record matches the presented digest.
    Missing,
    /// The record exists but was already rotated or revoked.
    NotLive,
    /// The record is live but past its expiry. Nothing was written.
    Expired,
}

/// Signed access and refresh tokens handed to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// A user together with a freshly issued session
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: SessionTokens,
}

/// Command to register a password-based account with validated fields
#[derive(Debug)]
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub username: Username,
    pub password: Password,
}

impl RegisterCommand {
    pub fn new(email: EmailAddress, username: Username, password: Password) -> Self {
        Self {
            email,
            username,
            password,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let email = EmailAddress::new("  Alice@Example.COM ".to_string()).unwrap();

        assert_eq!(email.as_str(), "alice@example.com");
        assert_eq!(email.local_part(), "alice");
    }

    #[test]
    fn test_email_rejects_garbage() {
        assert!(EmailAddress::new("not-an-email".to_string()).is_err());
    }

    #[test]
    fn test_username_rules() {
        assert!(Username::new("john.doe_42-x".to_string()).is_ok());
        assert_eq!(
            Username::new("ab".to_string()),
            Err(UsernameError::TooShort { min: 3, actual: 2 })
        );
        assert_eq!(
            Username::new("a".repeat(51)),
            Err(UsernameError::TooLong {
                max: 50,
                actual: 51
            })
        );
        assert_eq!(
            Username::new("john doe".to_string()),
            Err(UsernameError::InvalidCharacters)
        );
    }

    #[test]
    fn test_username_from_email_local_part() {
        let email = EmailAddress::new("j+o@example.com".to_string()).unwrap();

        let base = Username::from_email_local_part(&email, None);
        assert_eq!(base.as_str(), "jo_");
        assert!(Username::new(base.as_str().to_string()).is_ok());

        let suffixed = Username::from_email_local_part(&email, Some("a1b2c3"));
        assert_eq!(suffixed.as_str(), "jo_-a1b2c3");
    }

    #[test]
    fn test_username_from_long_local_part_stays_valid() {
        let email = EmailAddress::new(format!("{}@example.com", "x".repeat(64))).unwrap();

        let username = Username::from_email_local_part(&email, Some("abcdef"));
        assert!(Username::new(username.as_str().to_string()).is_ok());
    }

    #[test]
    fn test_password_policy() {
        assert!(Password::new("Str0ng!pass".to_string()).is_ok());
        assert_eq!(
            Password::new("S0!a".to_string()),
            Err(PasswordPolicyError::TooShort { min: 8 })
        );
        assert_eq!(
            Password::new("STR0NG!PASS".to_string()),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            Password::new("str0ng!pass".to_string()),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            Password::new("Strong!pass".to_string()),
            Err(PasswordPolicyError::MissingDigit)
        );
        assert_eq!(
            Password::new("Str0ngpass".to_string()),
            Err(PasswordPolicyError::MissingSymbol)
        );
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("Str0ng!pass".to_string()).unwrap();
        assert!(!format!("{:?}", password).contains("Str0ng"));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_provider_maps_to_login_type() {
        assert_eq!(LoginType::from(Provider::Github), LoginType::Github);
        assert_eq!("google".parse::<Provider>(), Ok(Provider::Google));
        assert!("password".parse::<Provider>().is_err());
    }

    #[test]
    fn test_temporary_token_expiry_is_exclusive() {
        let now = Utc::now();
        let token = TemporaryToken {
            digest: "d".to_string(),
            expires_at: now,
        };

        assert!(token.is_live(now - Duration::seconds(1)));
        assert!(!token.is_live(now));
    }

    #[test]
    fn test_refresh_record_states() {
        let now = Utc::now();
        let mut record =
            RefreshTokenRecord::new(UserId::new(), "digest".to_string(), now, now);
        assert_eq!(record.state(), RefreshTokenState::Live);

        assert!(record.revoke(RevocationReason::Rotated, now));
        assert_eq!(record.state(), RefreshTokenState::Rotated);

        assert!(!record.revoke(RevocationReason::ReuseDetected, now));
        assert_eq!(record.revoked_reason, Some(RevocationReason::Rotated));
    }
}
