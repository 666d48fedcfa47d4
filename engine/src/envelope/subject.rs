//! The things a signed payload can vouch for.
//!
//! Each subject kind knows two things: which [`ApprovalThresholdSpec`] in
//! the trusted rules governs it, and how to read itself out of a verified
//! [`CanonicalPayload`]. Everything else (hashing, quorum, evaluation) is
//! shared and lives in [`super::verified`].
//!
//! Subjects have no public constructors. The only way to hold one is to
//! have verified the envelope that carried it.

use serde::Serialize;

use super::document::DocumentKind;
use crate::approval::ApprovalThresholdSpec;
use crate::canonical::{CanonicalPayload, DecimalAmount};
use crate::crypto::{parse_digest_hex, sha256, Digest256};
use crate::error::{GovernanceError, Result};
use crate::rules::{RuleSet, RulesContainer, SubjectScope};

/// A subject kind a verified envelope can expose.
pub trait TrustedSubject: Sized + Send + Sync {
    const KIND: DocumentKind;

    /// The threshold spec the trusted rules assign to this payload.
    fn resolve<'r>(
        rules: &'r RulesContainer,
        payload: &CanonicalPayload,
    ) -> Result<&'r ApprovalThresholdSpec>;

    /// Build the subject, reading every field from the canonical payload.
    fn materialize(payload: &CanonicalPayload) -> Result<Self>;
}

fn resolve_scoped<'r>(
    rules: &'r RulesContainer,
    set: RuleSet,
    kind: DocumentKind,
    scope: SubjectScope,
) -> Result<&'r ApprovalThresholdSpec> {
    rules
        .resolve(set, &scope)
        .ok_or_else(|| GovernanceError::NoApplicableRule {
            subject: format!(
                "{kind} on {}/{}",
                scope.blockchain.as_deref().unwrap_or("*"),
                scope.network.as_deref().unwrap_or("*")
            ),
        })
}

/// A scope field read before any approval is checked. A missing or mistyped
/// field means no rule applies, which keeps the failure in the integrity
/// category.
fn scope_field(payload: &CanonicalPayload, kind: DocumentKind, path: &str) -> Result<String> {
    payload
        .extract_str(path)
        .map(str::to_string)
        .map_err(|_| GovernanceError::NoApplicableRule {
            subject: format!("{kind} without a string at {path}"),
        })
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

// ---------------------------------------------------------------------------
// Whitelisted address
// ---------------------------------------------------------------------------

/// An approved withdrawal destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WhitelistedAddress {
    blockchain: String,
    network: String,
    address: String,
    label: String,
    memo: Option<String>,
    customer_id: Option<String>,
    address_type: Option<String>,
}

impl WhitelistedAddress {
    pub fn blockchain(&self) -> &str {
        &self.blockchain
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn address_type(&self) -> Option<&str> {
        self.address_type.as_deref()
    }
}

impl TrustedSubject for WhitelistedAddress {
    const KIND: DocumentKind = DocumentKind::WhitelistedAddress;

    fn resolve<'r>(
        rules: &'r RulesContainer,
        payload: &CanonicalPayload,
    ) -> Result<&'r ApprovalThresholdSpec> {
        let scope = SubjectScope {
            blockchain: Some(scope_field(payload, Self::KIND, "/blockchain")?),
            network: Some(scope_field(payload, Self::KIND, "/network")?),
            currency: None,
        };
        resolve_scoped(rules, RuleSet::AddressWhitelisting, Self::KIND, scope)
    }

    fn materialize(payload: &CanonicalPayload) -> Result<Self> {
        Ok(Self {
            blockchain: payload.extract_str("/blockchain")?.to_string(),
            network: payload.extract_str("/network")?.to_string(),
            address: payload.extract_str("/address")?.to_string(),
            label: payload.extract_str("/label")?.to_string(),
            memo: owned(payload.extract_optional_str("/memo")?),
            customer_id: owned(payload.extract_optional_str("/customer_id")?),
            address_type: owned(payload.extract_optional_str("/address_type")?),
        })
    }
}

// ---------------------------------------------------------------------------
// Whitelisted asset
// ---------------------------------------------------------------------------

/// An approved token contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WhitelistedAsset {
    blockchain: String,
    network: String,
    contract_address: String,
    symbol: String,
    name: String,
    decimals: u32,
    token_id: Option<String>,
}

impl WhitelistedAsset {
    pub fn blockchain(&self) -> &str {
        &self.blockchain
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }
}

impl TrustedSubject for WhitelistedAsset {
    const KIND: DocumentKind = DocumentKind::WhitelistedAsset;

    fn resolve<'r>(
        rules: &'r RulesContainer,
        payload: &CanonicalPayload,
    ) -> Result<&'r ApprovalThresholdSpec> {
        let scope = SubjectScope {
            blockchain: Some(scope_field(payload, Self::KIND, "/blockchain")?),
            network: Some(scope_field(payload, Self::KIND, "/network")?),
            currency: None,
        };
        resolve_scoped(rules, RuleSet::AssetWhitelisting, Self::KIND, scope)
    }

    fn materialize(payload: &CanonicalPayload) -> Result<Self> {
        Ok(Self {
            blockchain: payload.extract_str("/blockchain")?.to_string(),
            network: payload.extract_str("/network")?.to_string(),
            contract_address: payload.extract_str("/contract_address")?.to_string(),
            symbol: payload.extract_str("/symbol")?.to_string(),
            name: payload.extract_str("/name")?.to_string(),
            decimals: payload.extract_u32("/decimals")?,
            token_id: owned(payload.extract_optional_str("/token_id")?),
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction request
// ---------------------------------------------------------------------------

/// One side of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferEndpoint {
    address: String,
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<String>,
}

impl TransferEndpoint {
    fn read(payload: &CanonicalPayload, side: &str, with_memo: bool) -> Result<Self> {
        let memo = if with_memo {
            owned(payload.extract_optional_str(&format!("/{side}/memo"))?)
        } else {
            None
        };
        Ok(Self {
            address: payload.extract_str(&format!("/{side}/address"))?.to_string(),
            label: owned(payload.extract_optional_str(&format!("/{side}/label"))?),
            memo,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }
}

/// A transfer awaiting execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    request_id: String,
    blockchain: String,
    network: String,
    currency: String,
    source: TransferEndpoint,
    destination: TransferEndpoint,
    amount: DecimalAmount,
}

impl TransactionRequest {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn blockchain(&self) -> &str {
        &self.blockchain
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn source(&self) -> &TransferEndpoint {
        &self.source
    }

    pub fn destination(&self) -> &TransferEndpoint {
        &self.destination
    }

    /// Exact decimal text from the signed payload.
    pub fn amount(&self) -> &DecimalAmount {
        &self.amount
    }
}

impl TrustedSubject for TransactionRequest {
    const KIND: DocumentKind = DocumentKind::TransactionRequest;

    fn resolve<'r>(
        rules: &'r RulesContainer,
        payload: &CanonicalPayload,
    ) -> Result<&'r ApprovalThresholdSpec> {
        let scope = SubjectScope {
            blockchain: Some(scope_field(payload, Self::KIND, "/blockchain")?),
            network: Some(scope_field(payload, Self::KIND, "/network")?),
            currency: Some(scope_field(payload, Self::KIND, "/currency")?),
        };
        resolve_scoped(rules, RuleSet::Transactions, Self::KIND, scope)
    }

    fn materialize(payload: &CanonicalPayload) -> Result<Self> {
        let amount = payload.extract_decimal("/amount")?;
        if amount.is_negative() {
            return Err(GovernanceError::field_type("/amount", "non-negative decimal"));
        }
        Ok(Self {
            request_id: payload.extract_str("/request_id")?.to_string(),
            blockchain: payload.extract_str("/blockchain")?.to_string(),
            network: payload.extract_str("/network")?.to_string(),
            currency: payload.extract_str("/currency")?.to_string(),
            source: TransferEndpoint::read(payload, "source", false)?,
            destination: TransferEndpoint::read(payload, "destination", true)?,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Rules change
// ---------------------------------------------------------------------------

/// An approved proposal to replace the governance rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RulesChange {
    change_id: String,
    description: String,
    proposed_container_hash: String,
    proposed_by: String,
    #[serde(skip)]
    proposed_digest: Digest256,
}

impl RulesChange {
    pub fn change_id(&self) -> &str {
        &self.change_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lowercase hex SHA-256 of the approved container bytes.
    pub fn proposed_container_hash(&self) -> &str {
        &self.proposed_container_hash
    }

    pub fn proposed_by(&self) -> &str {
        &self.proposed_by
    }

    /// True if `container` is byte-for-byte the container that was approved.
    pub fn matches_container(&self, container: &[u8]) -> bool {
        sha256(container) == self.proposed_digest
    }
}

impl TrustedSubject for RulesChange {
    const KIND: DocumentKind = DocumentKind::RulesChange;

    fn resolve<'r>(
        rules: &'r RulesContainer,
        _payload: &CanonicalPayload,
    ) -> Result<&'r ApprovalThresholdSpec> {
        Ok(&rules.governance_thresholds)
    }

    fn materialize(payload: &CanonicalPayload) -> Result<Self> {
        const HASH_PATH: &str = "/proposed_container_hash";
        let proposed_digest = parse_digest_hex(payload.extract_str(HASH_PATH)?)
            .map_err(|_| GovernanceError::field_type(HASH_PATH, "hex SHA-256 digest"))?;
        Ok(Self {
            change_id: payload.extract_str("/change_id")?.to_string(),
            description: payload.extract_str("/description")?.to_string(),
            proposed_container_hash: hex::encode(proposed_digest),
            proposed_by: payload.extract_str("/proposed_by")?.to_string(),
            proposed_digest,
        })
    }
}
