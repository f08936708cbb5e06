use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Token family a set of claims belongs to.
///
/// Serialized into the `typ` claim so an access token can never be accepted where a
/// refresh token is expected, and vice versa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user identifier)
    pub sub: String,

    /// Role of the subject at issuance time
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    pub typ: TokenType,
}

impl AccessClaims {
    /// Create access claims valid for `ttl` starting at `now`.
    pub fn new(sub: impl ToString, role: impl ToString, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: sub.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ: TokenType::Access,
        }
    }

    /// Check if the claims are expired at the given timestamp.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

/// Claims carried by a long-lived refresh token.
///
/// No role is embedded: the role is re-resolved from the store on every rotation.
/// `jti` keeps two tokens issued for the same subject within one second distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Subject (user identifier)
    pub sub: String,

    /// Unique token identifier
    pub jti: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    pub typ: TokenType,
}

impl RefreshClaims {
    /// Create refresh claims valid for `ttl` starting at `now`.
    pub fn new(sub: impl ToString, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: sub.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ: TokenType::Refresh,
        }
    }

    /// Check if the claims are expired at the given timestamp.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_window() {
        let now = Utc::now();
        let claims = AccessClaims::new("user123", "admin", now, Duration::minutes(15));

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_claims_are_unique_per_issue() {
        let now = Utc::now();
        let first = RefreshClaims::new("user123", now, Duration::days(7));
        let second = RefreshClaims::new("user123", now, Duration::days(7));

        assert_eq!(first.iat, second.iat);
        assert_ne!(first.jti, second.jti);
        assert_eq!(first.exp - first.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_is_expired() {
        let claims = AccessClaims {
            sub: "user123".to_string(),
            role: "user".to_string(),
            iat: 0,
            exp: 1000,
            typ: TokenType::Access,
        };

        assert!(!claims.is_expired(999));
        assert!(!claims.is_expired(1000));
        assert!(claims.is_expired(1001));
    }

    #[test]
    fn test_token_type_serialization() {
        let json = serde_json::to_string(&TokenType::Refresh).unwrap();
        assert_eq!(json, "\"refresh\"");
    }
}
