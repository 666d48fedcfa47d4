//! # Verified Envelope
//!
//! The fail-closed pipeline that turns a signed document into a trusted
//! subject:
//!
//! 1. bind `payload_as_string` and parse the declared hash;
//! 2. recompute SHA-256 over the canonical string and compare;
//! 3. decode the embedded rules container (bootstrap only);
//! 4. ratify the container against the caller's SuperAdmin quorum;
//! 5. resolve the subject's threshold spec from the ratified rules and
//!    evaluate it against the payload's own approvals (a scope field that is
//!    missing at this point reports `NoApplicableRule`);
//! 6. materialize the subject from the canonical payload.
//!
//! Any failing step ends verification. The envelope moves from
//! `Unverified` to `Verified` or `Failed` exactly once, under a mutex, so
//! concurrent callers block on a single run and all observe its outcome.
//! Later calls return the cached outcome without redoing any cryptography.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::document::{RawDocument, SignedDocument};
use super::rules::{verify_rules_with_limit, TrustedRules};
use super::subject::TrustedSubject;
use crate::approval::evaluate;
use crate::canonical::CanonicalPayload;
use crate::config::{MAX_CANONICAL_PAYLOAD_BYTES, MAX_RULES_CONTAINER_BYTES};
use crate::crypto::parse_digest_hex;
use crate::error::{GovernanceError, Result};
use crate::quorum::{collect_valid_signers, SuperAdminQuorum};

/// Observable lifecycle of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeState {
    Unverified,
    Verified,
    Failed,
}

/// A verified subject together with the evidence that admitted it.
#[derive(Debug)]
pub struct Trusted<T> {
    subject: T,
    payload: CanonicalPayload,
    rules: TrustedRules,
    approvers: BTreeSet<String>,
    satisfied_chain: usize,
}

impl<T> Trusted<T> {
    pub fn subject(&self) -> &T {
        &self.subject
    }

    /// The canonical payload, for reading fields the subject type does not
    /// model.
    pub fn payload(&self) -> &CanonicalPayload {
        &self.payload
    }

    /// The ratified rules the approvals were judged against.
    pub fn rules(&self) -> &TrustedRules {
        &self.rules
    }

    /// Approvers with a valid signature over the payload.
    pub fn approvers(&self) -> &BTreeSet<String> {
        &self.approvers
    }

    /// Index of the parallel chain that was satisfied.
    pub fn satisfied_chain(&self) -> usize {
        self.satisfied_chain
    }
}

impl<T> Deref for Trusted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.subject
    }
}

enum Outcome<T> {
    Pending,
    Verified(Arc<Trusted<T>>),
    Failed(GovernanceError),
}

/// A signed document that exposes its subject only once verified.
pub struct VerifiedEnvelope<T> {
    document: SignedDocument,
    max_container_bytes: usize,
    max_payload_bytes: usize,
    outcome: Mutex<Outcome<T>>,
    runs: AtomicUsize,
    _subject: PhantomData<fn() -> T>,
}

impl<T: TrustedSubject> VerifiedEnvelope<T> {
    /// Wrap a parsed document. Nothing is checked until [`verify`](Self::verify).
    pub fn new(document: SignedDocument) -> Self {
        Self {
            document,
            max_container_bytes: MAX_RULES_CONTAINER_BYTES,
            max_payload_bytes: MAX_CANONICAL_PAYLOAD_BYTES,
            outcome: Mutex::new(Outcome::Pending),
            runs: AtomicUsize::new(0),
            _subject: PhantomData,
        }
    }

    /// Parse `raw` as a signed document of this subject's kind.
    pub fn from_raw(raw: &RawDocument) -> Result<Self> {
        if raw.kind() != T::KIND {
            return Err(GovernanceError::MalformedDocument {
                context: raw.kind().to_string(),
                reason: format!("expected a {} document", T::KIND),
            });
        }
        Ok(Self::new(raw.to_signed()?))
    }

    pub fn with_limits(mut self, max_container_bytes: usize, max_payload_bytes: usize) -> Self {
        self.max_container_bytes = max_container_bytes;
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// The document as received. Nothing read from here is trusted.
    pub fn document(&self) -> &SignedDocument {
        &self.document
    }

    /// Run the pipeline once and cache the outcome.
    ///
    /// The first call decides. Later calls, including ones passing a
    /// different quorum, return the cached subject or re-raise the cached
    /// error. To retry, build a new envelope from freshly fetched bytes.
    pub fn verify(&self, quorum: &SuperAdminQuorum) -> Result<Arc<Trusted<T>>> {
        let mut outcome = self.outcome.lock();
        match &*outcome {
            Outcome::Verified(trusted) => return Ok(Arc::clone(trusted)),
            Outcome::Failed(err) => {
                warn!(kind = %T::KIND, error = %err, "re-raising cached verification failure");
                return Err(err.clone());
            }
            Outcome::Pending => {}
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.run_pipeline(quorum) {
            Ok(trusted) => {
                info!(
                    kind = %T::KIND,
                    digest = %trusted.payload.digest_hex(),
                    approvers = trusted.approvers.len(),
                    chain = trusted.satisfied_chain,
                    "envelope verified"
                );
                let trusted = Arc::new(trusted);
                *outcome = Outcome::Verified(Arc::clone(&trusted));
                Ok(trusted)
            }
            Err(err) => {
                if err.is_security_event() {
                    error!(kind = %T::KIND, error = %err, "envelope failed integrity verification");
                } else {
                    warn!(
                        kind = %T::KIND,
                        category = %err.kind(),
                        error = %err,
                        "envelope rejected"
                    );
                }
                *outcome = Outcome::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// The verified subject, without running verification.
    ///
    /// [`GovernanceError::NotVerified`] before [`verify`](Self::verify) has
    /// been called; the cached error after a failed run.
    pub fn trusted(&self) -> Result<Arc<Trusted<T>>> {
        match &*self.outcome.lock() {
            Outcome::Pending => Err(GovernanceError::NotVerified),
            Outcome::Verified(trusted) => Ok(Arc::clone(trusted)),
            Outcome::Failed(err) => Err(err.clone()),
        }
    }

    pub fn state(&self) -> EnvelopeState {
        match &*self.outcome.lock() {
            Outcome::Pending => EnvelopeState::Unverified,
            Outcome::Verified(_) => EnvelopeState::Verified,
            Outcome::Failed(_) => EnvelopeState::Failed,
        }
    }

    /// How many times the pipeline has executed. Never more than one.
    pub fn verification_runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn run_pipeline(&self, quorum: &SuperAdminQuorum) -> Result<Trusted<T>> {
        let metadata = &self.document.metadata;

        // 1. bind
        let payload = CanonicalPayload::bind_with_limit(
            metadata.payload_as_string(),
            self.max_payload_bytes,
        )?;
        let declared = parse_digest_hex(metadata.hash())?;

        // 2. integrity
        if &declared != payload.digest() {
            return Err(GovernanceError::HashMismatch {
                declared: hex::encode(declared),
                computed: payload.digest_hex(),
            });
        }

        // 3 + 4. decode to bootstrap, then ratify
        let rules =
            verify_rules_with_limit(&self.document.rules, quorum, self.max_container_bytes)?;
        let container = rules.container();

        // 5. approvals
        let spec = T::resolve(container, &payload)?;
        let approver_keys = container.approver_directory()?;
        let signed = collect_valid_signers(
            payload.as_bytes(),
            &self.document.signatures,
            &approver_keys,
        );
        let approvers = container.approvers(&signed);
        let satisfied_chain = evaluate(spec, &approvers).satisfied_chain.ok_or_else(|| {
            GovernanceError::ThresholdNotSatisfied {
                subject: T::KIND.to_string(),
            }
        })?;

        // 6. materialize
        let subject = T::materialize(&payload)?;

        Ok(Trusted {
            subject,
            payload,
            rules,
            approvers: signed.distinct_signers,
            satisfied_chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalThresholdSpec;
    use crate::crypto::SignerKeypair;
    use crate::envelope::document::{RulesBundle, SignedMetadata};
    use crate::envelope::subject::WhitelistedAddress;
    use crate::quorum::{SignerDirectory, SignerSignature};
    use crate::rules::{self, Role, RuleGroup, RuleUser, RulesContainer, ScopedThresholds};

    const ADDRESS: &str =
        r#"{"blockchain":"ETH","network":"mainnet","address":"0xabc","label":"cold"}"#;

    fn admin() -> SignerKeypair {
        SignerKeypair::from_seed(&[1; 32])
    }

    fn approver(seed: u8) -> SignerKeypair {
        SignerKeypair::from_seed(&[seed; 32])
    }

    fn quorum() -> SuperAdminQuorum {
        let dir = SignerDirectory::from_entries([("sa", admin().public_key())]).unwrap();
        SuperAdminQuorum::new(dir, 1).unwrap()
    }

    fn rules_bundle() -> RulesBundle {
        let container = RulesContainer {
            users: vec![
                RuleUser {
                    id: "alice".into(),
                    public_key: approver(2).public_key(),
                    roles: vec![Role::Approver],
                },
                RuleUser {
                    id: "bob".into(),
                    public_key: approver(3).public_key(),
                    roles: vec![Role::Approver],
                },
            ],
            groups: vec![RuleGroup {
                id: "ops".into(),
                user_ids: vec!["alice".into(), "bob".into()],
            }],
            address_rules: vec![ScopedThresholds {
                thresholds: ApprovalThresholdSpec::from_tuples(&[&[("ops", 2)]]).unwrap(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let bytes = rules::encode(&container).unwrap();
        let sig = SignerSignature::new("sa", admin().sign(&bytes));
        RulesBundle::new(bytes, vec![sig])
    }

    fn document(canonical: &str, approvers: &[(&str, u8)]) -> SignedDocument {
        let signatures = approvers
            .iter()
            .map(|(id, seed)| SignerSignature::new(*id, approver(*seed).sign(canonical.as_bytes())))
            .collect();
        SignedDocument::new(SignedMetadata::seal(canonical), signatures, rules_bundle())
    }

    #[test]
    fn verifies_once_and_caches() {
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(document(
            ADDRESS,
            &[("alice", 2), ("bob", 3)],
        ));
        assert_eq!(env.state(), EnvelopeState::Unverified);
        assert_eq!(env.trusted().unwrap_err(), GovernanceError::NotVerified);

        let first = env.verify(&quorum()).unwrap();
        let second = env.verify(&quorum()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.address(), "0xabc");
        assert_eq!(first.satisfied_chain(), 0);
        assert_eq!(env.state(), EnvelopeState::Verified);
        assert_eq!(env.verification_runs(), 1);
    }

    #[test]
    fn failure_is_cached_and_reraised() {
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(document(ADDRESS, &[("alice", 2)]));
        let err = env.verify(&quorum()).unwrap_err();
        assert!(matches!(err, GovernanceError::ThresholdNotSatisfied { .. }));
        assert_eq!(env.verify(&quorum()).unwrap_err(), err);
        assert_eq!(env.trusted().unwrap_err(), err);
        assert_eq!(env.state(), EnvelopeState::Failed);
        assert_eq!(env.verification_runs(), 1);
    }

    #[test]
    fn forged_signer_identity_does_not_count() {
        // bob's id, alice's key
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(document(
            ADDRESS,
            &[("alice", 2), ("bob", 2)],
        ));
        assert!(env.verify(&quorum()).is_err());
    }

    #[test]
    fn hash_mismatch_is_integrity_failure() {
        let mut doc = document(ADDRESS, &[("alice", 2), ("bob", 3)]);
        let tampered = ADDRESS.replace("0xabc", "0xevil");
        doc.metadata = SignedMetadata::new(doc.metadata.hash(), tampered);
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(doc);
        let err = env.verify(&quorum()).unwrap_err();
        assert!(matches!(err, GovernanceError::HashMismatch { .. }));
        assert!(err.is_security_event());
    }

    #[test]
    fn malformed_declared_hash() {
        let mut doc = document(ADDRESS, &[("alice", 2), ("bob", 3)]);
        doc.metadata = SignedMetadata::new("abc123", ADDRESS);
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(doc);
        assert!(matches!(
            env.verify(&quorum()),
            Err(GovernanceError::MalformedHash { .. })
        ));
    }

    #[test]
    fn payload_limit_applies() {
        let env = VerifiedEnvelope::<WhitelistedAddress>::new(document(
            ADDRESS,
            &[("alice", 2), ("bob", 3)],
        ))
        .with_limits(MAX_RULES_CONTAINER_BYTES, 16);
        assert!(matches!(
            env.verify(&quorum()),
            Err(GovernanceError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn raw_document_kind_must_match() {
        let json = serde_json::to_vec(&document(ADDRESS, &[])).unwrap();
        let raw = RawDocument::new(crate::envelope::DocumentKind::WhitelistedAsset, json);
        assert!(VerifiedEnvelope::<WhitelistedAddress>::from_raw(&raw).is_err());
    }
}
