//! Credential primitives library
//!
//! Provides the leaf building blocks of the session engine:
//! - Password hashing (Argon2id)
//! - JWT encoding and validation
//! - Access/refresh token issuance with distinct secrets and lifetimes
//! - Random opaque secrets and their digests
//!
//! Services own their persistence and orchestration. This crate holds no state.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Access and Refresh Tokens
//! ```
//! use auth::TokenCodec;
//! use chrono::Utc;
//!
//! let codec = TokenCodec::new(
//!     b"access_secret_key_at_least_32_bytes!",
//!     b"refresh_secret_key_at_least_32_bytes",
//! );
//!
//! let access = codec.issue_access_token("user123", "admin", Utc::now()).unwrap();
//! let claims = codec.verify_access(&access.token).unwrap();
//! assert_eq!(claims.role, "admin");
//!
//! let refresh = codec.issue_refresh_token("user123", Utc::now()).unwrap();
//! let claims = codec.verify_refresh(&refresh.token).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```
//!
//! ## Temporary Secrets
//! ```
//! use auth::secret;
//!
//! let raw = secret::generate_secret();
//! let stored = secret::keyed_digest(b"server-side-pepper", &raw);
//! assert_ne!(raw, stored);
//! ```

pub mod codec;
pub mod jwt;
pub mod password;
pub mod secret;

pub use codec::CodecError;
pub use codec::IssuedToken;
pub use codec::TokenCodec;
pub use jwt::AccessClaims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::RefreshClaims;
pub use jwt::TokenType;
pub use password::PasswordError;
pub use password::PasswordHasher;
