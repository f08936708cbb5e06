use thiserror::Error;

/// Error type for JWT operations.
///
/// Expiry is reported separately from every other validation failure: callers retry
/// an expired access token through the refresh flow, while an invalid one forces a
/// fresh login.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is expired")]
    TokenExpired,

    #[error("Token is invalid: {0}")]
    InvalidToken(String),
}
