//! Wire records for signed governance documents.
//!
//! A signed document arrives as JSON:
//!
//! ```text
//! {
//!   "metadata":   { "hash", "payload_as_string", "payload"? },
//!   "signatures": [ { "signer_id", "signature", "comment"? } ],
//!   "rules":      { "container", "signatures" }
//! }
//! ```
//!
//! `metadata.payload` is the transport's free-form copy of the payload. It
//! is kept because it is part of the wire contract, but nothing trusted is
//! ever read from it: see [`SignedMetadata::untrusted_payload`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::crypto::sha256_hex;
use crate::error::{GovernanceError, Result};
use crate::quorum::SignerSignature;

/// What a raw document claims to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    RulesContainer,
    WhitelistedAddress,
    WhitelistedAsset,
    TransactionRequest,
    RulesChange,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::RulesContainer,
        DocumentKind::WhitelistedAddress,
        DocumentKind::WhitelistedAsset,
        DocumentKind::TransactionRequest,
        DocumentKind::RulesChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::RulesContainer => "rules-container",
            DocumentKind::WhitelistedAddress => "whitelisted-address",
            DocumentKind::WhitelistedAsset => "whitelisted-asset",
            DocumentKind::TransactionRequest => "transaction-request",
            DocumentKind::RulesChange => "rules-change",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes exactly as received, tagged with the context that produced them.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDocument {
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(kind: DocumentKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse as a signed payload document.
    pub fn to_signed(&self) -> Result<SignedDocument> {
        if self.kind == DocumentKind::RulesContainer {
            return Err(self.malformed("a rules bundle is not a signed payload document"));
        }
        serde_json::from_slice(&self.bytes).map_err(|e| self.malformed(e))
    }

    /// Parse as a standalone rules bundle.
    pub fn to_rules_bundle(&self) -> Result<RulesBundle> {
        if self.kind != DocumentKind::RulesContainer {
            return Err(self.malformed("expected a rules bundle"));
        }
        serde_json::from_slice(&self.bytes).map_err(|e| self.malformed(e))
    }

    fn malformed(&self, reason: impl fmt::Display) -> GovernanceError {
        GovernanceError::MalformedDocument {
            context: self.kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawDocument({}, {} bytes)", self.kind, self.bytes.len())
    }
}

/// The metadata block: declared hash, canonical string, and the transport's
/// free-form copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedMetadata {
    hash: String,
    payload_as_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl SignedMetadata {
    pub fn new(hash: impl Into<String>, payload_as_string: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            payload_as_string: payload_as_string.into(),
            payload: None,
        }
    }

    /// Metadata whose declared hash is the SHA-256 of `payload_as_string`.
    pub fn seal(payload_as_string: impl Into<String>) -> Self {
        let payload_as_string = payload_as_string.into();
        Self::new(sha256_hex(payload_as_string.as_bytes()), payload_as_string)
    }

    /// Attach a free-form copy, as a transport would.
    pub fn with_untrusted_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Declared hash, as hex text.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The exact string that was hashed and signed.
    pub fn payload_as_string(&self) -> &str {
        &self.payload_as_string
    }

    /// The transport's free-form copy of the payload.
    ///
    /// Not covered by the hash or any signature. Useful for display and
    /// diagnostics only; never feed it back into a trust decision.
    pub fn untrusted_payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// A rules container together with its SuperAdmin signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesBundle {
    #[serde(with = "hex_bytes")]
    container: Vec<u8>,
    signatures: Vec<SignerSignature>,
}

impl RulesBundle {
    pub fn new(container: Vec<u8>, signatures: Vec<SignerSignature>) -> Self {
        Self {
            container,
            signatures,
        }
    }

    /// Container bytes as received. Signatures cover exactly these.
    pub fn container_bytes(&self) -> &[u8] {
        &self.container
    }

    pub fn signatures(&self) -> &[SignerSignature] {
        &self.signatures
    }
}

/// A signed payload: metadata, approver signatures, and the governing rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedDocument {
    pub metadata: SignedMetadata,
    #[serde(default)]
    pub signatures: Vec<SignerSignature>,
    pub rules: RulesBundle,
}

impl SignedDocument {
    pub fn new(
        metadata: SignedMetadata,
        signatures: Vec<SignerSignature>,
        rules: RulesBundle,
    ) -> Self {
        Self {
            metadata,
            signatures,
            rules,
        }
    }
}

mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
