//! End-to-end tests for the governance verification engine.
//!
//! Each test builds its own signed rules container and signed payloads from
//! fixed seeds, then drives them through the public API exactly as a
//! caller would: raw bytes in, trusted subject or typed failure out.

use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;

use custody_governance::approval::{is_satisfied, ApprovalThresholdSpec, Approver};
use custody_governance::crypto::{sha256_hex, SignerKeypair};
use custody_governance::envelope::{
    RulesBundle, RulesChange, SignedDocument, SignedMetadata, TransactionRequest,
    WhitelistedAddress, WhitelistedAsset,
};
use custody_governance::quorum::{verify_quorum, SignerDirectory, SignerSignature, SuperAdminQuorum};
use custody_governance::rules::{self, Role, RuleGroup, RuleUser, RulesContainer, ScopedThresholds};
use custody_governance::{
    verify_rules, DocumentKind, EngineConfig, EnvelopeState, ErrorKind, GovernanceClient,
    GovernanceError, InMemoryDocumentSource, VerifiedEnvelope,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const ADDRESS: &str = r#"{"address":"0x00000000219ab540356cbb839cbe05303d7705fa","blockchain":"ETH","label":"Treasury cold wallet","network":"mainnet"}"#;

const TRANSFER: &str = r#"{"amount":"250000.123456789012345678","blockchain":"ETH","currency":"USDC","destination":{"address":"0xdest","label":"Exchange"},"network":"mainnet","request_id":"req-42","source":{"address":"0xsrc","label":"Hot wallet"}}"#;

fn keypair(seed: u8) -> SignerKeypair {
    SignerKeypair::from_seed(&[seed; 32])
}

/// Three SuperAdmins (seeds 1..=3) and five approvers (seeds 10..=14).
struct Fixture {
    admins: Vec<(String, SignerKeypair)>,
    approvers: Vec<(String, SignerKeypair)>,
    container: Vec<u8>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_rules(|_| {})
    }

    fn with_rules(tweak: impl FnOnce(&mut RulesContainer)) -> Self {
        let admins: Vec<_> = (1..=3u8).map(|i| (format!("sa-{i}"), keypair(i))).collect();
        let approvers: Vec<_> = ["alice", "bob", "carol", "dave", "erin"]
            .iter()
            .zip(10u8..)
            .map(|(name, seed)| (name.to_string(), keypair(seed)))
            .collect();

        let spec = |chains: &[&[(&str, u32)]]| ApprovalThresholdSpec::from_tuples(chains).unwrap();
        let mut container = RulesContainer {
            issued_at: 1_767_225_600,
            users: admins
                .iter()
                .map(|(id, kp)| RuleUser {
                    id: id.clone(),
                    public_key: kp.public_key(),
                    roles: vec![Role::SuperAdmin],
                })
                .chain(approvers.iter().map(|(id, kp)| RuleUser {
                    id: id.clone(),
                    public_key: kp.public_key(),
                    roles: vec![Role::Approver],
                }))
                .collect(),
            groups: vec![
                group("compliance", &["alice", "bob"]),
                group("treasury", &["bob", "carol"]),
                group("board", &["dave", "erin"]),
            ],
            minimum_super_admin_signatures: 2,
            governance_thresholds: spec(&[&[("board", 2)]]),
            address_rules: vec![ScopedThresholds {
                blockchain: Some("ETH".into()),
                thresholds: spec(&[&[("compliance", 2), ("treasury", 1)], &[("board", 2)]]),
                ..Default::default()
            }],
            asset_rules: vec![ScopedThresholds {
                thresholds: spec(&[&[("compliance", 1)]]),
                ..Default::default()
            }],
            transaction_rules: vec![ScopedThresholds {
                blockchain: Some("eth".into()),
                currency: Some("usdc".into()),
                thresholds: spec(&[&[("compliance", 1), ("treasury", 1)]]),
                ..Default::default()
            }],
        };
        tweak(&mut container);
        let container = rules::encode(&container).unwrap();

        Self {
            admins,
            approvers,
            container,
        }
    }

    fn quorum(&self, minimum: usize) -> SuperAdminQuorum {
        let dir = SignerDirectory::from_entries(
            self.admins.iter().map(|(id, kp)| (id.clone(), kp.public_key())),
        )
        .unwrap();
        SuperAdminQuorum::new(dir, minimum).unwrap()
    }

    fn rules_bundle(&self, admin_signers: &[&str]) -> RulesBundle {
        let signatures = sign_all(&self.admins, admin_signers, &self.container);
        RulesBundle::new(self.container.clone(), signatures)
    }

    fn document(&self, canonical: &str, approvers: &[&str]) -> SignedDocument {
        SignedDocument::new(
            SignedMetadata::seal(canonical),
            sign_all(&self.approvers, approvers, canonical.as_bytes()),
            self.rules_bundle(&["sa-1", "sa-2"]),
        )
    }
}

fn group(id: &str, members: &[&str]) -> RuleGroup {
    RuleGroup {
        id: id.into(),
        user_ids: members.iter().map(|m| m.to_string()).collect(),
    }
}

fn sign_all(
    keys: &[(String, SignerKeypair)],
    who: &[&str],
    message: &[u8],
) -> Vec<SignerSignature> {
    who.iter()
        .map(|name| {
            let (id, kp) = keys.iter().find(|(id, _)| id == name).unwrap();
            SignerSignature::new(id.clone(), kp.sign(message))
        })
        .collect()
}

fn envelope<T: custody_governance::envelope::TrustedSubject>(
    doc: SignedDocument,
) -> VerifiedEnvelope<T> {
    VerifiedEnvelope::new(doc)
}

// ---------------------------------------------------------------------------
// Quorum
// ---------------------------------------------------------------------------

#[test]
fn quorum_ignores_signers_outside_directory() {
    let fx = Fixture::new();
    let outsider = keypair(99);
    let mut signatures = sign_all(&fx.admins, &["sa-1", "sa-3"], &fx.container);
    signatures.push(SignerSignature::new("mallory", outsider.sign(&fx.container)));

    let result = verify_quorum(&fx.container, &signatures, fx.quorum(2).directory(), 2).unwrap();
    assert_eq!(result.distinct_count(), 2);
    assert!(!result.distinct_signers.contains("mallory"));
}

#[test]
fn duplicate_signatures_count_once() {
    let fx = Fixture::new();
    let signatures = sign_all(&fx.admins, &["sa-1", "sa-1", "sa-1"], &fx.container);
    let err = verify_quorum(&fx.container, &signatures, fx.quorum(2).directory(), 2).unwrap_err();
    assert_eq!(err, GovernanceError::InsufficientQuorum { valid: 1, required: 2 });
}

#[test]
fn rules_need_super_admin_ratification() {
    let fx = Fixture::new();
    let trusted = verify_rules(&fx.rules_bundle(&["sa-2", "sa-3"]), &fx.quorum(1)).unwrap();
    assert_eq!(trusted.digest_hex(), sha256_hex(&fx.container));
    assert_eq!(trusted.container().groups.len(), 3);

    // container asks for 2, caller asked for 1: container wins
    let err = verify_rules(&fx.rules_bundle(&["sa-2"]), &fx.quorum(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

// ---------------------------------------------------------------------------
// Threshold evaluation
// ---------------------------------------------------------------------------

#[test]
fn first_chain_satisfied_without_alternative() {
    let spec =
        ApprovalThresholdSpec::from_tuples(&[&[("G1", 2), ("G2", 1)], &[("G3", 3)]]).unwrap();
    let a = |id: &str, g: &str| Approver::new(id, [g]);

    assert!(is_satisfied(&spec, &[a("u1", "G1"), a("u2", "G1"), a("u3", "G2")]));
    assert!(!is_satisfied(&spec, &[a("u1", "G1"), a("u2", "G1")]));
}

#[test]
fn empty_spec_is_never_satisfied() {
    let spec = ApprovalThresholdSpec::default();
    assert!(!is_satisfied(&spec, &[]));
    assert!(!is_satisfied(&spec, &[Approver::new("u1", ["G1"])]));
}

// ---------------------------------------------------------------------------
// Envelope pipeline
// ---------------------------------------------------------------------------

#[test]
fn whitelisted_address_through_client() {
    let fx = Fixture::new();
    let source = InMemoryDocumentSource::new();
    let doc = fx.document(ADDRESS, &["alice", "bob", "carol"]);
    source.insert(
        DocumentKind::WhitelistedAddress,
        "wa-1",
        serde_json::to_vec(&doc).unwrap(),
    );
    source.insert(
        DocumentKind::RulesContainer,
        "current",
        serde_json::to_vec(&fx.rules_bundle(&["sa-1", "sa-3"])).unwrap(),
    );

    let client = GovernanceClient::new(source, fx.quorum(2));
    let trusted = client.verify_whitelisted_address("wa-1").unwrap();
    assert_eq!(trusted.address(), "0x00000000219ab540356cbb839cbe05303d7705fa");
    assert_eq!(trusted.label(), "Treasury cold wallet");
    assert_eq!(trusted.memo(), None);
    assert_eq!(trusted.satisfied_chain(), 0);
    assert_eq!(trusted.approvers().len(), 3);

    let rules = client.verify_rules("current").unwrap();
    assert_eq!(rules.digest(), trusted.rules().digest());
}

#[test]
fn board_chain_is_an_alternative() {
    let fx = Fixture::new();
    let env = envelope::<WhitelistedAddress>(fx.document(ADDRESS, &["dave", "erin"]));
    let trusted = env.verify(&fx.quorum(2)).unwrap();
    assert_eq!(trusted.satisfied_chain(), 1);
}

#[test]
fn one_person_cannot_fill_two_tiers() {
    let fx = Fixture::new();
    // bob is in compliance and treasury but counts for only one of them
    let env = envelope::<TransactionRequest>(fx.document(TRANSFER, &["bob"]));
    let err = env.verify(&fx.quorum(2)).unwrap_err();
    assert!(matches!(err, GovernanceError::ThresholdNotSatisfied { .. }));

    let env = envelope::<TransactionRequest>(fx.document(TRANSFER, &["bob", "alice"]));
    let tx = env.verify(&fx.quorum(2)).unwrap();
    assert_eq!(tx.amount().as_str(), "250000.123456789012345678");
    assert_eq!(tx.destination().address(), "0xdest");
    assert_eq!(tx.currency(), "USDC");
}

#[test]
fn untrusted_payload_never_leaks_into_subject() {
    let fx = Fixture::new();
    let mut doc = fx.document(ADDRESS, &["alice", "bob", "carol"]);
    let forged = json!({
        "address": "0xattacker",
        "blockchain": "ETH",
        "label": "Treasury cold wallet",
        "network": "mainnet",
    });
    doc.metadata = doc.metadata.clone().with_untrusted_payload(forged.clone());

    let env = envelope::<WhitelistedAddress>(doc);
    let trusted = env.verify(&fx.quorum(2)).unwrap();
    assert_eq!(trusted.address(), "0x00000000219ab540356cbb839cbe05303d7705fa");
    assert_eq!(
        trusted.payload().extract_str("/address").unwrap(),
        "0x00000000219ab540356cbb839cbe05303d7705fa"
    );
    assert_eq!(env.document().metadata.untrusted_payload(), Some(&forged));
}

#[test]
fn one_changed_character_fails_integrity() {
    let fx = Fixture::new();
    let doc = fx.document(ADDRESS, &["alice", "bob", "carol"]);
    assert_eq!(doc.metadata.hash(), sha256_hex(ADDRESS.as_bytes()));

    let tampered = ADDRESS.replacen("0x0000", "0x0001", 1);
    let mut bad = doc.clone();
    bad.metadata = SignedMetadata::new(doc.metadata.hash(), tampered);

    assert!(envelope::<WhitelistedAddress>(doc).verify(&fx.quorum(2)).is_ok());
    let err = envelope::<WhitelistedAddress>(bad)
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::HashMismatch { .. }));
    assert!(err.is_security_event());
}

#[test]
fn unratified_rules_are_never_trusted() {
    let fx = Fixture::new();
    let mut doc = fx.document(ADDRESS, &["alice", "bob", "carol"]);
    doc.rules = fx.rules_bundle(&["sa-1"]);
    let err = envelope::<WhitelistedAddress>(doc)
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert_eq!(err, GovernanceError::InsufficientQuorum { valid: 1, required: 2 });
}

#[test]
fn rules_signed_by_impostor_admins_fail() {
    // The container names its own SuperAdmins, but only the caller's
    // directory decides who ratifies.
    let fx = Fixture::new();
    let impostors: Vec<_> = vec![
        ("sa-1".to_string(), keypair(50)),
        ("sa-2".to_string(), keypair(51)),
    ];
    let mut doc = fx.document(ADDRESS, &["alice", "bob", "carol"]);
    doc.rules = RulesBundle::new(
        fx.container.clone(),
        sign_all(&impostors, &["sa-1", "sa-2"], &fx.container),
    );
    let err = envelope::<WhitelistedAddress>(doc)
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::InsufficientQuorum { valid: 0, .. }));
}

#[test]
fn missing_rule_fails_closed() {
    let fx = Fixture::with_rules(|rules| rules.transaction_rules.clear());
    let err = envelope::<TransactionRequest>(fx.document(TRANSFER, &["alice", "bob"]))
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::NoApplicableRule { .. }));
}

#[test]
fn verified_payload_missing_field() {
    let fx = Fixture::new();
    let canonical = r#"{"blockchain":"ETH","contract_address":"0xa0b8","name":"USD Coin","network":"mainnet","symbol":"USDC"}"#;
    let err = envelope::<WhitelistedAsset>(fx.document(canonical, &["alice"]))
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert_eq!(err, GovernanceError::FieldNotFound { path: "/decimals".into() });
    assert_eq!(err.kind(), ErrorKind::FieldNotFound);
}

#[test]
fn approved_rules_change_pins_the_next_container() {
    let fx = Fixture::new();
    let next = Fixture::with_rules(|rules| rules.issued_at += 86_400).container;
    let canonical = json!({
        "change_id": "chg-7",
        "description": "rotate treasury group",
        "proposed_by": "dave",
        "proposed_container_hash": sha256_hex(&next),
    })
    .to_string();

    let change = envelope::<RulesChange>(fx.document(&canonical, &["dave", "erin"]))
        .verify(&fx.quorum(2))
        .unwrap();
    assert!(change.matches_container(&next));
    assert!(!change.matches_container(&fx.container));

    let err = envelope::<RulesChange>(fx.document(&canonical, &["alice", "bob", "carol"]))
        .verify(&fx.quorum(2))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::ThresholdNotSatisfied { .. }));
}

// ---------------------------------------------------------------------------
// Idempotence & concurrency
// ---------------------------------------------------------------------------

#[test]
fn same_input_same_outcome() {
    let fx = Fixture::new();
    let good = fx.document(ADDRESS, &["dave", "erin"]);
    let bad = fx.document(ADDRESS, &["dave"]);

    let a = envelope::<WhitelistedAddress>(good.clone()).verify(&fx.quorum(2)).unwrap();
    let b = envelope::<WhitelistedAddress>(good).verify(&fx.quorum(2)).unwrap();
    assert_eq!(a.subject(), b.subject());

    let e1 = envelope::<WhitelistedAddress>(bad.clone()).verify(&fx.quorum(2)).unwrap_err();
    let e2 = envelope::<WhitelistedAddress>(bad).verify(&fx.quorum(2)).unwrap_err();
    assert_eq!(e1, e2);
}

#[test]
fn concurrent_callers_share_one_verification() {
    let fx = Fixture::new();
    let env = Arc::new(envelope::<WhitelistedAddress>(fx.document(
        ADDRESS,
        &["alice", "bob", "carol"],
    )));
    let quorum = Arc::new(fx.quorum(2));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let env = Arc::clone(&env);
            let quorum = Arc::clone(&quorum);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                env.verify(&quorum).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert_eq!(env.verification_runs(), 1);
    assert_eq!(env.state(), EnvelopeState::Verified);
}

#[test]
fn concurrent_callers_share_one_failure() {
    let fx = Fixture::new();
    let env = Arc::new(envelope::<WhitelistedAddress>(fx.document(ADDRESS, &["alice"])));
    let quorum = Arc::new(fx.quorum(2));

    let errors: Vec<_> = (0..4)
        .map(|_| {
            let env = Arc::clone(&env);
            let quorum = Arc::clone(&quorum);
            thread::spawn(move || env.verify(&quorum).unwrap_err())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert!(errors.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(env.verification_runs(), 1);
    assert_eq!(env.state(), EnvelopeState::Failed);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn engine_config_drives_the_client() {
    let fx = Fixture::new();
    let config = EngineConfig::from_json(
        &json!({
            "super_admins": fx.admins.iter().map(|(id, kp)| json!({
                "id": id,
                "public_key": kp.public_key().to_hex(),
            })).collect::<Vec<_>>(),
            "minimum_super_admin_signatures": 2,
            "max_payload_bytes": 64,
        })
        .to_string(),
    )
    .unwrap();

    let source = InMemoryDocumentSource::new();
    source.insert(
        DocumentKind::WhitelistedAddress,
        "wa-1",
        serde_json::to_vec(&fx.document(ADDRESS, &["dave", "erin"])).unwrap(),
    );
    let client = GovernanceClient::new(source, config.clone()).with_limits_from(&config);
    let err = client.verify_whitelisted_address("wa-1").unwrap_err();
    assert!(matches!(
        err.governance(),
        Some(GovernanceError::MalformedPayload { .. })
    ));
}
