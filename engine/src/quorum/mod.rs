//! # Quorum Verification
//!
//! Signer directories and the M-of-N distinct-signer check used to ratify
//! rules containers and to authenticate approval signatures.

pub mod directory;
pub mod verifier;

pub use directory::{SignerDirectory, SuperAdminQuorum};
pub use verifier::{collect_valid_signers, verify_quorum, QuorumResult, SignerSignature};
