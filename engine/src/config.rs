//! # Engine Configuration & Constants
//!
//! Every fixed parameter of the verification engine lives here, next to the
//! [`EngineConfig`] record an operator uses to pin the SuperAdmin keys.
//!
//! The SuperAdmin keys are the root of trust. They must come from the
//! operator's own configuration, never from a document being verified.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::SignerPublicKey;
use crate::error::{GovernanceError, Result};
use crate::quorum::{SignerDirectory, SuperAdminQuorum};

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Signature scheme for SuperAdmin and approver signatures.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Digest binding a canonical payload string to its declared hash.
pub const DIGEST_ALGORITHM: &str = "SHA-256";

pub const PUBLIC_KEY_LENGTH: usize = 32;

pub const SECRET_KEY_LENGTH: usize = 32;

/// Ed25519 signatures are always 64 bytes. Anything else never verifies.
pub const SIGNATURE_LENGTH: usize = 64;

pub const DIGEST_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Rules Container Format
// ---------------------------------------------------------------------------

/// Every binary rules container starts with these four bytes.
pub const RULES_CONTAINER_MAGIC: &[u8; 4] = b"GVRC";

/// The only container layout this engine decodes.
pub const RULES_CONTAINER_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Input Limits
// ---------------------------------------------------------------------------

/// Largest rules container accepted, in bytes. Bounds allocations made while
/// decoding untrusted input.
pub const MAX_RULES_CONTAINER_BYTES: usize = 1024 * 1024;

/// Largest canonical payload string accepted, in bytes.
pub const MAX_CANONICAL_PAYLOAD_BYTES: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// A SuperAdmin entry in the operator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperAdminEntry {
    pub id: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: SignerPublicKey,
}

/// Operator-supplied verification parameters, loaded from JSON.
///
/// ```json
/// {
///   "super_admins": [{ "id": "sa-1", "public_key": "<64 hex chars>" }],
///   "minimum_super_admin_signatures": 2
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub super_admins: Vec<SuperAdminEntry>,
    pub minimum_super_admin_signatures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_container_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GovernanceError::InvalidConfig(format!("config parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            GovernanceError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Reject configurations the engine cannot verify against.
    pub fn validate(&self) -> Result<()> {
        self.super_admin_quorum()?;
        for (name, limit) in [
            ("max_container_bytes", self.max_container_bytes),
            ("max_payload_bytes", self.max_payload_bytes),
        ] {
            if limit == Some(0) {
                return Err(GovernanceError::InvalidConfig(format!(
                    "{name} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// The pinned SuperAdmin directory and its minimum.
    pub fn super_admin_quorum(&self) -> Result<SuperAdminQuorum> {
        let directory = SignerDirectory::from_entries(
            self.super_admins
                .iter()
                .map(|entry| (entry.id.clone(), entry.public_key)),
        )?;
        SuperAdminQuorum::new(directory, self.minimum_super_admin_signatures)
    }

    pub fn container_limit(&self) -> usize {
        self.max_container_bytes.unwrap_or(MAX_RULES_CONTAINER_BYTES)
    }

    pub fn payload_limit(&self) -> usize {
        self.max_payload_bytes.unwrap_or(MAX_CANONICAL_PAYLOAD_BYTES)
    }
}
