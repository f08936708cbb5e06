use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::jwt::AccessClaims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::jwt::RefreshClaims;
use crate::jwt::TokenType;

/// Default lifetime of an access token.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;

/// Default lifetime of a refresh token.
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Token codec errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Token is expired")]
    TokenExpired,

    #[error("Token is invalid: {0}")]
    TokenInvalid(String),

    #[error("Token signing failed: {0}")]
    SigningFailed(String),
}

impl From<JwtError> for CodecError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => CodecError::TokenExpired,
            JwtError::InvalidToken(msg) => CodecError::TokenInvalid(msg),
            JwtError::EncodingFailed(msg) => CodecError::SigningFailed(msg),
        }
    }
}

/// A freshly signed token together with its expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access and refresh tokens.
///
/// Access and refresh tokens are signed with distinct secrets and carry a `typ` claim,
/// so neither can be replayed in place of the other.
pub struct TokenCodec {
    access: JwtHandler,
    refresh: JwtHandler,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec with the default lifetimes (15 minutes / 7 days).
    ///
    /// # Arguments
    /// * `access_secret` - Signing key for access tokens
    /// * `refresh_secret` - Signing key for refresh tokens
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_lifetimes(
            access_secret,
            refresh_secret,
            Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            Duration::days(DEFAULT_REFRESH_TTL_DAYS),
        )
    }

    /// Create a codec with explicit token lifetimes.
    pub fn with_lifetimes(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: JwtHandler::new(access_secret),
            refresh: JwtHandler::new(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an access token carrying `{sub, role, iat, exp}`, issued at `now`.
    ///
    /// # Errors
    /// * `SigningFailed` - Token encoding failed
    pub fn issue_access_token(
        &self,
        user_id: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, CodecError> {
        let claims = AccessClaims::new(user_id, role, now, self.access_ttl);
        let token = self.access.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: timestamp_to_datetime(claims.exp)?,
        })
    }

    /// Sign a refresh token carrying `{sub, jti, iat, exp}`. No role is embedded.
    ///
    /// # Errors
    /// * `SigningFailed` - Token encoding failed
    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, CodecError> {
        let claims = RefreshClaims::new(user_id, now, self.refresh_ttl);
        let token = self.refresh.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: timestamp_to_datetime(claims.exp)?,
        })
    }

    /// Verify an access token.
    ///
    /// # Errors
    /// * `TokenExpired` - Token is authentic but past its `exp`
    /// * `TokenInvalid` - Bad signature, malformed token, or not an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, CodecError> {
        let claims: AccessClaims = self.access.decode(token)?;
        expect_type(claims.typ, TokenType::Access)?;
        Ok(claims)
    }

    /// Verify a refresh token, including its `exp` claim.
    ///
    /// # Errors
    /// * `TokenExpired` - Token is authentic but past its `exp`
    /// * `TokenInvalid` - Bad signature, malformed token, or not a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, CodecError> {
        let claims: RefreshClaims = self.refresh.decode(token)?;
        expect_type(claims.typ, TokenType::Refresh)?;
        Ok(claims)
    }

    /// Verify a refresh token's signature and shape only.
    ///
    /// Expiry is left to the caller, which holds the authoritative record.
    ///
    /// # Errors
    /// * `TokenInvalid` - Bad signature, malformed token, or not a refresh token
    pub fn verify_refresh_signature(&self, token: &str) -> Result<RefreshClaims, CodecError> {
        let claims: RefreshClaims = self.refresh.decode_ignoring_expiry(token)?;
        expect_type(claims.typ, TokenType::Refresh)?;
        Ok(claims)
    }
}

fn expect_type(actual: TokenType, expected: TokenType) -> Result<(), CodecError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CodecError::TokenInvalid(format!(
            "expected {:?} token, got {:?}",
            expected, actual
        )))
    }
}

fn timestamp_to_datetime(timestamp: i64) -> Result<DateTime<Utc>, CodecError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| CodecError::SigningFailed(format!("timestamp out of range: {}", timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"access_secret_key_at_least_32_bytes!";
    const REFRESH_SECRET: &[u8] = b"refresh_secret_key_at_least_32_bytes";

    fn codec() -> TokenCodec {
        TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET)
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = codec();

        let issued = codec
            .issue_access_token("user123", "admin", Utc::now())
            .expect("Failed to issue access token");
        let claims = codec
            .verify_access(&issued.token)
            .expect("Failed to verify access token");

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_refresh_token_carries_no_role() {
        let codec = codec();

        let issued = codec
            .issue_refresh_token("user123", Utc::now())
            .expect("Failed to issue refresh token");
        let claims = codec
            .verify_refresh(&issued.token)
            .expect("Failed to verify refresh token");

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);

        let raw: serde_json::Value = JwtHandler::new(REFRESH_SECRET)
            .decode(&issued.token)
            .expect("Failed to decode raw claims");
        assert!(raw.get("role").is_none());
    }

    #[test]
    fn test_issued_at_follows_supplied_instant() {
        let codec = codec();
        let now = Utc::now() - Duration::minutes(5);

        let access = codec.issue_access_token("user123", "user", now).unwrap();
        let refresh = codec.issue_refresh_token("user123", now).unwrap();

        let access_claims = codec.verify_access(&access.token).unwrap();
        let refresh_claims = codec.verify_refresh(&refresh.token).unwrap();
        assert_eq!(access_claims.iat, now.timestamp());
        assert_eq!(refresh_claims.iat, now.timestamp());
        assert_eq!(
            refresh.expires_at.timestamp(),
            (now + Duration::days(7)).timestamp()
        );
    }

    #[test]
    fn test_refresh_tokens_issued_together_differ() {
        let codec = codec();

        let first = codec.issue_refresh_token("user123", Utc::now()).unwrap();
        let second = codec.issue_refresh_token("user123", Utc::now()).unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let codec = codec();
        let access = codec.issue_access_token("user123", "user", Utc::now()).unwrap();

        assert!(matches!(
            codec.verify_refresh(&access.token),
            Err(CodecError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = codec();
        let refresh = codec.issue_refresh_token("user123", Utc::now()).unwrap();

        assert!(matches!(
            codec.verify_access(&refresh.token),
            Err(CodecError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_same_secret_still_checks_token_type() {
        let codec = TokenCodec::new(ACCESS_SECRET, ACCESS_SECRET);
        let refresh = codec.issue_refresh_token("user123", Utc::now()).unwrap();

        assert!(matches!(
            codec.verify_access(&refresh.token),
            Err(CodecError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_expired_access_token() {
        let codec = TokenCodec::with_lifetimes(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::seconds(-5),
            Duration::days(7),
        );
        let issued = codec.issue_access_token("user123", "user", Utc::now()).unwrap();

        assert_eq!(
            codec.verify_access(&issued.token),
            Err(CodecError::TokenExpired)
        );
    }

    #[test]
    fn test_expired_refresh_token_signature_still_verifies() {
        let codec = TokenCodec::with_lifetimes(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::minutes(15),
            Duration::seconds(-5),
        );
        let issued = codec.issue_refresh_token("user123", Utc::now()).unwrap();

        assert_eq!(
            codec.verify_refresh(&issued.token),
            Err(CodecError::TokenExpired)
        );
        let claims = codec
            .verify_refresh_signature(&issued.token)
            .expect("Signature should verify");
        assert_eq!(claims.sub, "user123");
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let codec = codec();
        let issued = codec.issue_access_token("user123", "user", Utc::now()).unwrap();
        let tampered = format!("{}x", issued.token);

        assert!(matches!(
            codec.verify_access(&tampered),
            Err(CodecError::TokenInvalid(_))
        ));
    }
}
