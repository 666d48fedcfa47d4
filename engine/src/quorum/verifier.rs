//! Quorum signature verification.
//!
//! [`verify_quorum`] answers one question: did at least `minimum_valid`
//! *distinct* signers from the directory produce a valid signature over
//! these exact bytes?
//!
//! Counting rules:
//!
//! - a signer absent from the directory is ignored: not counted, not an error;
//! - an invalid signature is ignored;
//! - several signatures from one signer count once, provided at least one of
//!   them verifies. A bad extra signature does not revoke a good one.
//!
//! Verification is pure and takes only shared references, so it is safe to
//! call concurrently and to repeat on cached documents.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::directory::SignerDirectory;
use crate::crypto::SignatureBytes;
use crate::error::{GovernanceError, Result};

/// One signature attached to a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSignature {
    pub signer_id: String,
    pub signature: SignatureBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SignerSignature {
    pub fn new(signer_id: impl Into<String>, signature: SignatureBytes) -> Self {
        Self {
            signer_id: signer_id.into(),
            signature,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Outcome of counting valid signatures. Derived, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuorumResult {
    /// Number of signatures that verified, duplicates included.
    pub valid_count: usize,
    /// Directory members with at least one valid signature.
    pub distinct_signers: BTreeSet<String>,
}

impl QuorumResult {
    pub fn distinct_count(&self) -> usize {
        self.distinct_signers.len()
    }

    pub fn is_satisfied(&self, minimum_valid: usize) -> bool {
        minimum_valid > 0 && self.distinct_count() >= minimum_valid
    }
}

/// Count the directory members that validly signed `document`.
///
/// Never fails: unknown signers and bad signatures are simply not counted.
pub fn collect_valid_signers(
    document: &[u8],
    signatures: &[SignerSignature],
    directory: &SignerDirectory,
) -> QuorumResult {
    let mut result = QuorumResult::default();

    for sig in signatures {
        let Some(public_key) = directory.get(&sig.signer_id) else {
            debug!(signer = %sig.signer_id, "ignoring signature from signer outside directory");
            continue;
        };
        if public_key.verify(document, &sig.signature) {
            result.valid_count += 1;
            result.distinct_signers.insert(sig.signer_id.clone());
        } else {
            debug!(
                signer = %sig.signer_id,
                key = %public_key.short_hex(),
                "ignoring invalid signature"
            );
        }
    }

    result
}

/// Verify that `document` carries a quorum of distinct valid signatures.
///
/// # Errors
///
/// - [`GovernanceError::InvalidConfig`] if `minimum_valid` is zero.
/// - [`GovernanceError::InsufficientQuorum`] if fewer than `minimum_valid`
///   distinct directory members signed validly. There is no partially
///   trusted result.
pub fn verify_quorum(
    document: &[u8],
    signatures: &[SignerSignature],
    directory: &SignerDirectory,
    minimum_valid: usize,
) -> Result<QuorumResult> {
    if minimum_valid == 0 {
        return Err(GovernanceError::InvalidConfig(
            "minimum valid signatures must be at least 1".into(),
        ));
    }

    let result = collect_valid_signers(document, signatures, directory);
    if !result.is_satisfied(minimum_valid) {
        return Err(GovernanceError::InsufficientQuorum {
            valid: result.distinct_count(),
            required: minimum_valid,
        });
    }

    debug!(
        distinct = result.distinct_count(),
        required = minimum_valid,
        "quorum reached"
    );
    Ok(result)
}
