//! # Signer Keys
//!
//! Ed25519 key material for governance signers: SuperAdmins ratifying a
//! rules container and approvers signing whitelist or request payloads.
//!
//! The engine itself only ever *verifies*. [`SignerKeypair`] exists so that
//! producers (and tests) can create signatures the engine will accept; it
//! never appears on the verification path.
//!
//! Key bytes are never logged. Public keys render as hex, truncated in
//! `Debug` output.

use std::fmt;

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors that can occur while loading key material.
///
/// Deliberately terse: the reason a key failed to load is not something an
/// attacker needs to learn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// An Ed25519 signing keypair belonging to one governance signer.
pub struct SignerKeypair {
    signing_key: SigningKey,
}

/// A validated Ed25519 public key.
///
/// Construction always checks that the bytes decode to a curve point, so a
/// `SignerPublicKey` in hand is usable for verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignerPublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

/// Raw signature bytes as received from a document.
///
/// Kept as a byte vector rather than a fixed array because the bytes come
/// from untrusted input: a signature of the wrong length is not a parse
/// error, it simply never verifies.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SignatureBytes(Vec<u8>);

impl SignerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a keypair from a hex-encoded 32-byte secret.
    pub fn from_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> SignerPublicKey {
        SignerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign `message`. Ed25519 is deterministic, so the same key and message
    /// always yield the same signature.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for SignerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerKeypair(pub={})", self.public_key().short_hex())
    }
}

// ---------------------------------------------------------------------------
// SignerPublicKey
// ---------------------------------------------------------------------------

impl SignerPublicKey {
    /// Validate and wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| KeyError::InvalidPublicKey("not a valid Ed25519 point".into()))?;
        Ok(Self { bytes })
    }

    /// Validate a byte slice of unknown length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = slice.try_into().map_err(|_| {
            KeyError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                slice.len()
            ))
        })?;
        Self::from_bytes(bytes)
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| KeyError::InvalidPublicKey(format!("hex decode failed: {e}")))?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// First 8 bytes as hex. What log lines get.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.bytes[..8])
    }

    /// Verify `signature` over `message`.
    ///
    /// A boolean on purpose: callers count valid signatures, they do not
    /// branch on the reason one was invalid.
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature.as_bytes()) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&sig_bytes);
        // Strict mode rejects small-order keys and non-canonical encodings.
        verifying_key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Display for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerPublicKey({})", self.short_hex())
    }
}

impl Serialize for SignerPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignerPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SignerPublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SignatureBytes
// ---------------------------------------------------------------------------

impl SignatureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s.trim()).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({} bytes)", self.0.len())
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SignatureBytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
