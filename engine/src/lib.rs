// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Governance: Verification Engine
//!
//! Decides whether a governance policy, a whitelisted address or asset, a
//! transaction request, or a proposed rules change may be trusted and acted
//! upon. Nothing leaves this crate as trusted data until a hash check, a
//! SuperAdmin quorum, and an approval threshold have all passed.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **canonical**: binds the exact signed string to its parsed tree and
//!   digest. The only source of field values.
//! - **rules**: the decoded policy model and its binary codec.
//! - **quorum**: counts distinct valid signers against a directory.
//! - **approval**: "who must approve" specs and their evaluator.
//! - **envelope**: the fail-closed pipeline, verified once and cached.
//! - **source**: collaborator traits and the [`GovernanceClient`] façade.
//! - **crypto**, **config**, **error**: primitives, constants, failures.
//!
//! ## Trust model
//!
//! 1. The SuperAdmin keys come from the caller's configuration, never from a
//!    document under verification.
//! 2. A rules container is decoded before it is ratified only to learn its
//!    quorum size. Nothing else is read from it until the quorum passes.
//! 3. Every failure is terminal for the envelope that hit it. No retries.

pub mod approval;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod quorum;
pub mod rules;
pub mod source;

pub use canonical::{CanonicalPayload, DecimalAmount};
pub use config::EngineConfig;
pub use envelope::{
    verify_rules, DocumentKind, EnvelopeState, RawDocument, Trusted, TrustedRules,
    VerifiedEnvelope,
};
pub use error::{ErrorKind, GovernanceError, Result};
pub use source::{
    ClientError, DocumentSource, GovernanceClient, InMemoryDocumentSource, SignerDirectorySource,
    SourceError,
};
