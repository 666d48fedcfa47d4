//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations: Ed25519 (`ed25519-dalek`) for
//! signer keys and signatures, SHA-256 (`sha2`) for payload digests. Nothing
//! here is governance-aware; the quorum and envelope modules build on it.

pub mod hash;
pub mod keys;

pub use hash::{parse_digest_hex, sha256, sha256_hex, Digest256};
pub use keys::{KeyError, SignatureBytes, SignerKeypair, SignerPublicKey};
