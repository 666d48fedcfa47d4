//! Error types for the governance verification engine.
//!
//! Every fallible operation in the crate returns a [`GovernanceError`]. Each
//! variant belongs to exactly one [`ErrorKind`], and the kind decides how a
//! caller should react:
//!
//! - [`ErrorKind::MalformedInput`]: the bytes did not parse. Not a security
//!   event; safe to log verbatim and reject.
//! - [`ErrorKind::Integrity`]: a digest, quorum, or approval check failed.
//!   Treat as a potential incident. Never retry automatically.
//! - [`ErrorKind::FieldNotFound`]: a verified payload lacks a field the
//!   caller asked for, or carries it with the wrong shape.
//! - [`ErrorKind::Configuration`]: the caller handed the engine invalid
//!   verification parameters.
//!
//! The enum is `Clone + PartialEq` because a verified envelope caches its
//! failure and re-raises the identical value on every later call.

use std::fmt;

use thiserror::Error;

/// The four failure categories surfaced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    Integrity,
    FieldNotFound,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::MalformedInput => "malformed-input",
            ErrorKind::Integrity => "integrity",
            ErrorKind::FieldNotFound => "field-not-found",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

/// Errors produced while decoding, verifying, or reading governance documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    // -- malformed input ----------------------------------------------------
    /// The rules container bytes are not a structurally valid container.
    #[error("malformed rules container: {reason}")]
    MalformedContainer { reason: String },

    /// The canonical payload string is not well-formed JSON.
    #[error("malformed canonical payload: {reason}")]
    MalformedPayload { reason: String },

    /// A signed document (JSON wire record) could not be parsed.
    #[error("malformed {context} document: {reason}")]
    MalformedDocument { context: String, reason: String },

    /// The declared hash is not a hex-encoded SHA-256 digest.
    #[error("malformed declared hash: {reason}")]
    MalformedHash { reason: String },

    // -- integrity ----------------------------------------------------------
    /// The recomputed digest of the canonical string differs from the
    /// declared hash.
    #[error("payload hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch { declared: String, computed: String },

    /// Fewer distinct authorized signers than required produced a valid
    /// signature over the document.
    #[error("insufficient quorum: {valid} distinct valid signers, {required} required")]
    InsufficientQuorum { valid: usize, required: usize },

    /// No alternative approval chain was satisfied by the payload's signers.
    #[error("approval threshold not satisfied for {subject}")]
    ThresholdNotSatisfied { subject: String },

    /// The trusted rules define no threshold applicable to the subject.
    #[error("no approval rule applies to {subject}")]
    NoApplicableRule { subject: String },

    /// A trusted accessor was used before the envelope was verified.
    #[error("envelope has not been verified")]
    NotVerified,

    // -- field not found ----------------------------------------------------
    /// The verified payload has no value at the requested path.
    #[error("field not found: {path}")]
    FieldNotFound { path: String },

    /// The verified payload carries the field with an unexpected shape.
    #[error("field {path} has unexpected type: expected {expected}")]
    FieldType { path: String, expected: String },

    // -- configuration ------------------------------------------------------
    /// The caller supplied invalid verification parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GovernanceError {
    /// The failure category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::MalformedContainer { .. }
            | GovernanceError::MalformedPayload { .. }
            | GovernanceError::MalformedDocument { .. }
            | GovernanceError::MalformedHash { .. } => ErrorKind::MalformedInput,
            GovernanceError::HashMismatch { .. }
            | GovernanceError::InsufficientQuorum { .. }
            | GovernanceError::ThresholdNotSatisfied { .. }
            | GovernanceError::NoApplicableRule { .. }
            | GovernanceError::NotVerified => ErrorKind::Integrity,
            GovernanceError::FieldNotFound { .. } | GovernanceError::FieldType { .. } => {
                ErrorKind::FieldNotFound
            }
            GovernanceError::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }

    /// True for failures that must be treated as potential security incidents.
    pub fn is_security_event(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }

    pub(crate) fn malformed_container(reason: impl Into<String>) -> Self {
        GovernanceError::MalformedContainer {
            reason: reason.into(),
        }
    }

    pub(crate) fn field_type(path: &str, expected: &str) -> Self {
        GovernanceError::FieldType {
            path: path.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GovernanceError>;
