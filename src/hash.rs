//! SHA-256 and HMAC-SHA-256 utilities for the reasoning core.
//!
//! All hashing is deterministic and reproducible across platforms.
//! Uses `sha2`/`hmac` for audited, constant-time implementations.

use crate::errors::{KolibriError, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Compute SHA-256 hash of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 of multiple byte slices (concatenated).
pub fn sha256_multi(data_slices: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for slice in data_slices {
        hasher.update(slice);
    }
    hasher.finalize().into()
}

/// Compute SHA-256 hex digest of a UTF-8 string.
pub fn sha256_hex_str(s: &str) -> String {
    hex::encode(sha256(s.as_bytes()))
}

/// Compute HMAC-SHA-256 over `data` keyed by `key`. An empty key yields an
/// empty string per `spec.md` §4.8/§6: an absent key means "unauthenticated",
/// not "HMAC with the empty string as key".
pub fn hmac_sha256_hex(key: &str, data: &[u8]) -> Result<String> {
    if key.is_empty() {
        return Ok(String::new());
    }
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| KolibriError::HashInitFailure { context: "hmac-sha256" })?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify hash matches expected value.
pub fn verify_hash(data: &[u8], expected_hash_hex: &str) -> bool {
    hex::encode(sha256(data)) == expected_hash_hex
}
