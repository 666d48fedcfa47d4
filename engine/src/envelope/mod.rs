//! Signed documents and the verified envelope that guards them.

pub mod document;
pub mod rules;
pub mod subject;
pub mod verified;

pub use document::{DocumentKind, RawDocument, RulesBundle, SignedDocument, SignedMetadata};
pub use rules::{verify_rules, verify_rules_with_limit, TrustedRules};
pub use subject::{
    RulesChange, TransactionRequest, TransferEndpoint, TrustedSubject, WhitelistedAddress,
    WhitelistedAsset,
};
pub use verified::{EnvelopeState, Trusted, VerifiedEnvelope};
