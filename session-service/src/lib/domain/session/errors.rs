use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error(
        "Username contains invalid characters (only alphanumeric, underscore, hyphen, and dot allowed)"
    )]
    InvalidCharacters,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for password policy violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} characters")]
    TooShort { min: usize },

    #[error("Password must contain a lowercase letter")]
    MissingLowercase,

    #[error("Password must contain an uppercase letter")]
    MissingUppercase,

    #[error("Password must contain a digit")]
    MissingDigit,

    #[error("Password must contain one of @$!%*?&")]
    MissingSymbol,
}

/// Error for Role parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Error for identity provider parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Unknown identity provider: {0}")]
    Unknown(String),
}

/// Error reported by persistence adapters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Carries the constraint name.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// The store could not complete the operation; nothing was applied.
    #[error("Store unavailable: {0}")]
    Transient(String),

    /// A stored row could not be mapped back into the domain model.
    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Error for event publishing operations
#[derive(Debug, Clone, Error)]
pub enum EventPublisherError {
    #[error("Failed to serialize event: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish event: {0}")]
    PublishFailed(String),
}

/// Error for outbound mail delivery
#[derive(Debug, Clone, Error)]
pub enum MailerError {
    #[error("Mail delivery request failed: {0}")]
    RequestFailed(String),

    #[error("Mail provider rejected the message with status {0}")]
    Rejected(u16),
}

/// Top-level error for all session operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Weak password: {0}")]
    WeakPassword(#[from] PasswordPolicyError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    #[error("Invalid provider: {0}")]
    InvalidProvider(#[from] ProviderError),

    // Credential and token errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Token is invalid")]
    TokenInvalid,

    #[error("Token is expired")]
    TokenExpired,

    #[error("Refresh token reuse detected")]
    RefreshReuseDetected,

    #[error("Refresh token is expired")]
    RefreshTokenExpired,

    #[error("Token is invalid or expired")]
    TemporaryTokenInvalidOrExpired,

    // Account state errors
    #[error("Account was registered with {0} login; use that login method")]
    IdentityProviderConflict(String),

    #[error("Email or username already exists")]
    DuplicateEmailOrUsername,

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("User not found")]
    NotFound,

    #[error("New password must differ from the current password")]
    SamePassword,

    #[error("Email is already verified")]
    EmailAlreadyVerified,

    #[error("Identity provider did not share an email address")]
    MissingProviderEmail,

    // Infrastructure errors
    #[error("Stored credential is corrupt")]
    CorruptCredential,

    #[error("Store temporarily unavailable: {0}")]
    TransientStoreFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => SessionError::DuplicateEmailOrUsername,
            StoreError::Transient(msg) => SessionError::TransientStoreFailure(msg),
            StoreError::Corrupt(msg) => SessionError::Internal(msg),
        }
    }
}

impl From<auth::CodecError> for SessionError {
    fn from(err: auth::CodecError) -> Self {
        match err {
            auth::CodecError::TokenExpired => SessionError::TokenExpired,
            auth::CodecError::TokenInvalid(_) => SessionError::TokenInvalid,
            auth::CodecError::SigningFailed(msg) => SessionError::Internal(msg),
        }
    }
}

impl From<auth::PasswordError> for SessionError {
    fn from(err: auth::PasswordError) -> Self {
        match err {
            auth::PasswordError::MalformedHash(_) => SessionError::CorruptCredential,
            auth::PasswordError::EmptyPassword | auth::PasswordError::HashingFailed(_) => {
                SessionError::Internal(err.to_string())
            }
        }
    }
}
