//! Opaque secrets and their digests.
//!
//! Raw secrets leave the process only through an out-of-band channel (an email link or a
//! cookie). Persistent storage only ever sees the digest.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

/// Number of random bytes in a generated secret (256 bits of entropy).
pub const SECRET_BYTES: usize = 32;

/// Generate a cryptographically random secret, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Unkeyed SHA-256 digest of a value, hex-encoded.
///
/// Suitable for values that already carry their own entropy and signature, such as
/// refresh tokens.
pub fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Keyed SHA-256 digest of a value, hex-encoded.
///
/// The key is length-prefixed so that `(key, value)` pairs cannot collide by shifting
/// bytes between the two.
pub fn keyed_digest(key: &[u8], value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key);
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two byte strings in time independent of where they first differ.
///
/// Best effort only: `black_box` hints the optimizer away from short-circuiting the
/// fold but is not a guaranteed barrier. Unequal lengths return early, so length
/// is not hidden.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let diff = a
        .iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| std::hint::black_box(acc | (x ^ y)));
    diff == 0
}
