//! Collaborators and the client façade.
//!
//! The engine does no I/O. A [`DocumentSource`] hands it raw bytes and a
//! [`SignerDirectorySource`] hands it the pinned SuperAdmin quorum;
//! [`GovernanceClient`] wires the two into one entry point per subject kind.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::config::{EngineConfig, MAX_CANONICAL_PAYLOAD_BYTES, MAX_RULES_CONTAINER_BYTES};
use crate::envelope::{
    verify_rules_with_limit, DocumentKind, RawDocument, RulesChange, TransactionRequest, Trusted,
    TrustedRules, TrustedSubject, VerifiedEnvelope, WhitelistedAddress, WhitelistedAsset,
};
use crate::error::{GovernanceError, Result};
use crate::quorum::SuperAdminQuorum;

/// Failures fetching raw documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("no {kind} document for {subject_id}")]
    NotFound {
        kind: DocumentKind,
        subject_id: String,
    },

    #[error("document source unavailable: {0}")]
    Unavailable(String),
}

/// Errors from [`GovernanceClient`]: either the bytes could not be fetched
/// or the engine rejected them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

impl ClientError {
    /// The engine error, if the engine was the one that refused.
    pub fn governance(&self) -> Option<&GovernanceError> {
        match self {
            ClientError::Governance(err) => Some(err),
            ClientError::Source(_) => None,
        }
    }
}

/// Supplies raw documents by kind and subject id.
pub trait DocumentSource: Send + Sync {
    fn fetch(
        &self,
        kind: DocumentKind,
        subject_id: &str,
    ) -> std::result::Result<RawDocument, SourceError>;
}

/// Supplies the SuperAdmin quorum from trusted, out-of-band configuration.
pub trait SignerDirectorySource: Send + Sync {
    fn super_admin_quorum(&self) -> Result<SuperAdminQuorum>;
}

impl SignerDirectorySource for SuperAdminQuorum {
    fn super_admin_quorum(&self) -> Result<SuperAdminQuorum> {
        Ok(self.clone())
    }
}

impl SignerDirectorySource for EngineConfig {
    fn super_admin_quorum(&self) -> Result<SuperAdminQuorum> {
        EngineConfig::super_admin_quorum(self)
    }
}

impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    fn fetch(
        &self,
        kind: DocumentKind,
        subject_id: &str,
    ) -> std::result::Result<RawDocument, SourceError> {
        (**self).fetch(kind, subject_id)
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// A [`DocumentSource`] backed by a map. Handy for tests and for callers that
/// already hold the bytes.
#[derive(Debug, Default)]
pub struct InMemoryDocumentSource {
    documents: RwLock<HashMap<(DocumentKind, String), Vec<u8>>>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        kind: DocumentKind,
        subject_id: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) {
        self.documents
            .write()
            .insert((kind, subject_id.into()), bytes.into());
    }

    pub fn remove(&self, kind: DocumentKind, subject_id: &str) -> bool {
        self.documents
            .write()
            .remove(&(kind, subject_id.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentSource for InMemoryDocumentSource {
    fn fetch(
        &self,
        kind: DocumentKind,
        subject_id: &str,
    ) -> std::result::Result<RawDocument, SourceError> {
        self.documents
            .read()
            .get(&(kind, subject_id.to_string()))
            .map(|bytes| RawDocument::new(kind, bytes.clone()))
            .ok_or_else(|| SourceError::NotFound {
                kind,
                subject_id: subject_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// GovernanceClient
// ---------------------------------------------------------------------------

/// Fetch-then-verify entry points, one per subject kind.
///
/// Every call fetches fresh bytes and verifies them from scratch; caching
/// verified subjects is the caller's business.
pub struct GovernanceClient<D, S> {
    documents: D,
    directory: S,
    max_container_bytes: usize,
    max_payload_bytes: usize,
}

impl<D: DocumentSource, S: SignerDirectorySource> GovernanceClient<D, S> {
    pub fn new(documents: D, directory: S) -> Self {
        Self {
            documents,
            directory,
            max_container_bytes: MAX_RULES_CONTAINER_BYTES,
            max_payload_bytes: MAX_CANONICAL_PAYLOAD_BYTES,
        }
    }

    /// Size limits from an [`EngineConfig`].
    pub fn with_limits_from(mut self, config: &EngineConfig) -> Self {
        self.max_container_bytes = config.container_limit();
        self.max_payload_bytes = config.payload_limit();
        self
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Fetch and ratify the current rules, stored under `subject_id`.
    pub fn verify_rules(&self, subject_id: &str) -> std::result::Result<TrustedRules, ClientError> {
        let raw = self.documents.fetch(DocumentKind::RulesContainer, subject_id)?;
        let bundle = raw.to_rules_bundle()?;
        let quorum = self.directory.super_admin_quorum()?;
        Ok(verify_rules_with_limit(&bundle, &quorum, self.max_container_bytes)?)
    }

    pub fn verify_whitelisted_address(
        &self,
        subject_id: &str,
    ) -> std::result::Result<Arc<Trusted<WhitelistedAddress>>, ClientError> {
        self.verify(subject_id)
    }

    pub fn verify_whitelisted_asset(
        &self,
        subject_id: &str,
    ) -> std::result::Result<Arc<Trusted<WhitelistedAsset>>, ClientError> {
        self.verify(subject_id)
    }

    pub fn verify_transaction_request(
        &self,
        subject_id: &str,
    ) -> std::result::Result<Arc<Trusted<TransactionRequest>>, ClientError> {
        self.verify(subject_id)
    }

    pub fn verify_rules_change(
        &self,
        subject_id: &str,
    ) -> std::result::Result<Arc<Trusted<RulesChange>>, ClientError> {
        self.verify(subject_id)
    }

    /// Fetch a document and wrap it, unverified.
    pub fn envelope<T: TrustedSubject>(
        &self,
        subject_id: &str,
    ) -> std::result::Result<VerifiedEnvelope<T>, ClientError> {
        let raw = self.documents.fetch(T::KIND, subject_id)?;
        debug!(
            kind = %T::KIND,
            subject = subject_id,
            bytes = raw.as_bytes().len(),
            "fetched document"
        );
        Ok(VerifiedEnvelope::from_raw(&raw)?
            .with_limits(self.max_container_bytes, self.max_payload_bytes))
    }

    /// Fetch, verify, and return the trusted subject.
    pub fn verify<T: TrustedSubject>(
        &self,
        subject_id: &str,
    ) -> std::result::Result<Arc<Trusted<T>>, ClientError> {
        let quorum = self.directory.super_admin_quorum()?;
        let envelope = self.envelope::<T>(subject_id)?;
        Ok(envelope.verify(&quorum)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SignerKeypair;
    use crate::quorum::SignerDirectory;

    fn quorum() -> SuperAdminQuorum {
        let key = SignerKeypair::from_seed(&[1; 32]).public_key();
        SuperAdminQuorum::new(SignerDirectory::from_entries([("sa", key)]).unwrap(), 1).unwrap()
    }

    #[test]
    fn in_memory_source_roundtrip() {
        let source = InMemoryDocumentSource::new();
        assert!(source.is_empty());
        source.insert(DocumentKind::WhitelistedAddress, "addr-1", b"{}".to_vec());
        let raw = source.fetch(DocumentKind::WhitelistedAddress, "addr-1").unwrap();
        assert_eq!(raw.as_bytes(), b"{}");
        assert_eq!(raw.kind(), DocumentKind::WhitelistedAddress);

        // same id, other kind
        assert!(matches!(
            source.fetch(DocumentKind::WhitelistedAsset, "addr-1"),
            Err(SourceError::NotFound { .. })
        ));
        assert!(source.remove(DocumentKind::WhitelistedAddress, "addr-1"));
        assert!(source.is_empty());
    }

    #[test]
    fn missing_document_is_a_source_error() {
        let client = GovernanceClient::new(InMemoryDocumentSource::new(), quorum());
        let err = client.verify_whitelisted_address("nope").unwrap_err();
        assert!(err.governance().is_none());
        assert_eq!(err.to_string(), "no whitelisted-address document for nope");
    }

    #[test]
    fn garbage_document_is_a_governance_error() {
        let source = InMemoryDocumentSource::new();
        source.insert(DocumentKind::TransactionRequest, "tx-1", "not json");
        let client = GovernanceClient::new(source, quorum());
        let err = client.verify_transaction_request("tx-1").unwrap_err();
        assert!(matches!(
            err.governance(),
            Some(GovernanceError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn shared_source_through_arc() {
        let source = Arc::new(InMemoryDocumentSource::new());
        let client = GovernanceClient::new(Arc::clone(&source), quorum());
        source.insert(DocumentKind::RulesContainer, "current", "{}");
        assert!(client.verify_rules("current").is_err());
        assert_eq!(client.documents().len(), 1);
    }
}
