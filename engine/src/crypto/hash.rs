//! # Digests
//!
//! SHA-256 over canonical bytes. This is the digest a signed payload
//! declares in its `hash` field and the one the engine recomputes before
//! trusting anything the payload says.
//!
//! Declared hashes arrive as hex text. They are compared as decoded bytes,
//! so `ABC1..` and `abc1..` are the same digest.

use sha2::{Digest, Sha256};

use crate::config::DIGEST_LENGTH;
use crate::error::{GovernanceError, Result};

/// A 32-byte SHA-256 digest.
pub type Digest256 = [u8; DIGEST_LENGTH];

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Digest256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; DIGEST_LENGTH];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 of `data`, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Decode a declared hex digest.
///
/// Anything that is not exactly 32 bytes of hex is malformed input, not a
/// mismatch: the producer never computed a digest at all.
pub fn parse_digest_hex(declared: &str) -> Result<Digest256> {
    let bytes = hex::decode(declared.trim()).map_err(|e| GovernanceError::MalformedHash {
        reason: format!("hex decode failed: {e}"),
    })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| GovernanceError::MalformedHash {
            reason: format!("expected {DIGEST_LENGTH} bytes, got {}", bytes.len()),
        })
}
