//! SHA-256 helpers for comparing and logging credentials.

use sha2::{Digest, Sha256};

/// Hashes a token value using SHA-256.
#[must_use]
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Short, non-reversible identifier for a token, safe to log.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    hex::encode(&hash_token(token)[..6])
}

/// Compares two credentials in time independent of where they differ.
///
/// Both sides are hashed first so that the comparison also does not leak
/// their lengths.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (hash_token(a), hash_token(b));
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
