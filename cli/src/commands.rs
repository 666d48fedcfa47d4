//! Subcommand implementations. Each returns the JSON document printed on
//! stdout; `main` owns printing and exit codes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use custody_governance::config::RULES_CONTAINER_MAGIC;
use custody_governance::crypto::sha256_hex;
use custody_governance::envelope::{
    verify_rules_with_limit, RulesChange, TransactionRequest, Trusted, TrustedSubject,
    WhitelistedAddress, WhitelistedAsset,
};
use custody_governance::rules::{self, RulesContainer};
use custody_governance::{
    DocumentKind, EngineConfig, GovernanceClient, RawDocument, TrustedRules, VerifiedEnvelope,
};

use crate::cli::{SubjectKind, VerifyArgs};
use crate::file_source::FileDocumentSource;

/// Decode a container for display. The output is marked unverified.
pub fn inspect_rules(path: &Path) -> Result<Value> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let (container_bytes, signature_count) = if bytes.starts_with(RULES_CONTAINER_MAGIC) {
        (bytes, None)
    } else {
        let raw = RawDocument::new(DocumentKind::RulesContainer, bytes);
        let bundle = raw.to_rules_bundle()?;
        let count = bundle.signatures().len();
        (bundle.container_bytes().to_vec(), Some(count))
    };

    let container = rules::decode(&container_bytes)?;
    warn!(file = %path.display(), "printing UNVERIFIED rules; no signatures were checked");

    let mut summary = rules_summary(&container, &sha256_hex(&container_bytes));
    summary["verified"] = json!(false);
    if let Some(count) = signature_count {
        summary["signatures_present"] = json!(count);
    }
    Ok(summary)
}

/// Verify a document of `args.kind` against the configured SuperAdmins.
pub fn verify(args: &VerifyArgs) -> Result<Value> {
    let config = EngineConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    match (&args.document, &args.store, &args.id) {
        (Some(path), _, _) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            verify_raw(args.kind, &RawDocument::new(args.kind.into(), bytes), &config)
        }
        (None, Some(store), Some(id)) => {
            let source = FileDocumentSource::new(store);
            info!(store = %source.root().display(), %id, "verifying document from store");
            let client = GovernanceClient::new(source, config.clone()).with_limits_from(&config);
            Ok(match args.kind {
                SubjectKind::Rules => trusted_rules_json(&client.verify_rules(id)?),
                SubjectKind::Address => trusted_json(&client.verify_whitelisted_address(id)?),
                SubjectKind::Asset => trusted_json(&client.verify_whitelisted_asset(id)?),
                SubjectKind::Transaction => trusted_json(&client.verify_transaction_request(id)?),
                SubjectKind::RulesChange => trusted_json(&client.verify_rules_change(id)?),
            })
        }
        _ => anyhow::bail!("either --document or --store with --id is required"),
    }
}

fn verify_raw(kind: SubjectKind, raw: &RawDocument, config: &EngineConfig) -> Result<Value> {
    match kind {
        SubjectKind::Rules => {
            let bundle = raw.to_rules_bundle()?;
            let quorum = config.super_admin_quorum()?;
            let trusted = verify_rules_with_limit(&bundle, &quorum, config.container_limit())?;
            Ok(trusted_rules_json(&trusted))
        }
        SubjectKind::Address => verify_subject::<WhitelistedAddress>(raw, config),
        SubjectKind::Asset => verify_subject::<WhitelistedAsset>(raw, config),
        SubjectKind::Transaction => verify_subject::<TransactionRequest>(raw, config),
        SubjectKind::RulesChange => verify_subject::<RulesChange>(raw, config),
    }
}

fn verify_subject<T>(raw: &RawDocument, config: &EngineConfig) -> Result<Value>
where
    T: TrustedSubject + Serialize,
{
    let quorum = config.super_admin_quorum()?;
    let envelope = VerifiedEnvelope::<T>::from_raw(raw)?
        .with_limits(config.container_limit(), config.payload_limit());
    let trusted = envelope.verify(&quorum)?;
    Ok(trusted_json(&trusted))
}

fn trusted_json<T: TrustedSubject + Serialize>(trusted: &Arc<Trusted<T>>) -> Value {
    json!({
        "verified": true,
        "kind": T::KIND,
        "subject": trusted.subject(),
        "payload_hash": trusted.payload().digest_hex(),
        "approvers": trusted.approvers(),
        "satisfied_chain": trusted.satisfied_chain(),
        "rules_hash": trusted.rules().digest_hex(),
    })
}

fn trusted_rules_json(trusted: &TrustedRules) -> Value {
    let mut summary = rules_summary(trusted.container(), &trusted.digest_hex());
    summary["verified"] = json!(true);
    summary["ratified_by"] = json!(trusted.ratified_by());
    summary
}

fn rules_summary(container: &RulesContainer, digest_hex: &str) -> Value {
    json!({
        "kind": DocumentKind::RulesContainer,
        "hash": digest_hex,
        "issued_at": container.issued_at().map(|t| t.to_rfc3339()),
        "rules": container,
    })
}
