//! Binary wire format for rules containers.
//!
//! ```text
//! "GVRC" | bincode(ContainerWire)
//! ```
//!
//! bincode runs with fixed-width little-endian integers, a hard size limit,
//! and trailing bytes rejected, so one container has exactly one encoding.
//! Signatures over a container cover these bytes as received.

use bincode::Options;
use serde::{Deserialize, Serialize};

use super::container::{Role, RuleGroup, RuleUser, RulesContainer, ScopedThresholds};
use crate::approval::{ApprovalThresholdSpec, GroupRequirement, SequentialChain};
use crate::config::{
    MAX_RULES_CONTAINER_BYTES, PUBLIC_KEY_LENGTH, RULES_CONTAINER_MAGIC, RULES_CONTAINER_VERSION,
};
use crate::crypto::SignerPublicKey;
use crate::error::{GovernanceError, Result};

#[derive(Serialize, Deserialize)]
struct ContainerWire {
    version: u16,
    issued_at: i64,
    users: Vec<UserWire>,
    groups: Vec<GroupWire>,
    minimum_super_admin_signatures: u32,
    governance_thresholds: SpecWire,
    address_rules: Vec<ScopedWire>,
    asset_rules: Vec<ScopedWire>,
    transaction_rules: Vec<ScopedWire>,
}

#[derive(Serialize, Deserialize)]
struct UserWire {
    id: String,
    public_key: [u8; PUBLIC_KEY_LENGTH],
    roles: Vec<Role>,
}

#[derive(Serialize, Deserialize)]
struct GroupWire {
    id: String,
    user_ids: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SpecWire {
    parallel: Vec<Vec<RequirementWire>>,
}

#[derive(Serialize, Deserialize)]
struct RequirementWire {
    group_id: String,
    minimum_signatures: u32,
}

#[derive(Serialize, Deserialize)]
struct ScopedWire {
    blockchain: Option<String>,
    network: Option<String>,
    currency: Option<String>,
    thresholds: SpecWire,
}

fn options(limit: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(limit as u64)
        .reject_trailing_bytes()
}

/// Decode a rules container with the default size limit.
pub fn decode(bytes: &[u8]) -> Result<RulesContainer> {
    decode_with_limit(bytes, MAX_RULES_CONTAINER_BYTES)
}

/// Decode a rules container no larger than `max_bytes`. Every failure is
/// [`GovernanceError::MalformedContainer`].
pub fn decode_with_limit(bytes: &[u8], max_bytes: usize) -> Result<RulesContainer> {
    if bytes.len() > max_bytes {
        return Err(GovernanceError::malformed_container(format!(
            "{} bytes exceeds limit of {max_bytes}",
            bytes.len()
        )));
    }
    let body = bytes
        .strip_prefix(RULES_CONTAINER_MAGIC.as_slice())
        .ok_or_else(|| GovernanceError::malformed_container("missing magic prefix"))?;

    let wire: ContainerWire = options(max_bytes)
        .deserialize(body)
        .map_err(|e| GovernanceError::malformed_container(e.to_string()))?;
    if wire.version != RULES_CONTAINER_VERSION {
        return Err(GovernanceError::malformed_container(format!(
            "unsupported version {}",
            wire.version
        )));
    }

    let container = from_wire(wire)?;
    container.validate()?;
    Ok(container)
}

/// Encode a container into its wire form. Producers sign the result.
pub fn encode(container: &RulesContainer) -> Result<Vec<u8>> {
    container.validate()?;
    let wire = to_wire(container);
    let mut out = RULES_CONTAINER_MAGIC.to_vec();
    options(MAX_RULES_CONTAINER_BYTES)
        .serialize_into(&mut out, &wire)
        .map_err(|e| GovernanceError::malformed_container(e.to_string()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Wire <-> model
// ---------------------------------------------------------------------------

fn from_wire(wire: ContainerWire) -> Result<RulesContainer> {
    let users = wire
        .users
        .into_iter()
        .map(|u| {
            let public_key = SignerPublicKey::from_bytes(u.public_key).map_err(|e| {
                GovernanceError::malformed_container(format!("user {}: {e}", u.id))
            })?;
            Ok(RuleUser {
                id: u.id,
                public_key,
                roles: u.roles,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RulesContainer {
        issued_at: wire.issued_at,
        users,
        groups: wire
            .groups
            .into_iter()
            .map(|g| RuleGroup {
                id: g.id,
                user_ids: g.user_ids,
            })
            .collect(),
        minimum_super_admin_signatures: wire.minimum_super_admin_signatures,
        governance_thresholds: spec_from_wire(wire.governance_thresholds)?,
        address_rules: scoped_from_wire(wire.address_rules)?,
        asset_rules: scoped_from_wire(wire.asset_rules)?,
        transaction_rules: scoped_from_wire(wire.transaction_rules)?,
    })
}

fn spec_from_wire(spec: SpecWire) -> Result<ApprovalThresholdSpec> {
    let parallel = spec
        .parallel
        .into_iter()
        .map(|chain| {
            chain
                .into_iter()
                .map(|r| {
                    GroupRequirement::new(r.group_id, r.minimum_signatures)
                        .map_err(|e| GovernanceError::malformed_container(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()
                .map(SequentialChain::new)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ApprovalThresholdSpec::new(parallel))
}

fn scoped_from_wire(rules: Vec<ScopedWire>) -> Result<Vec<ScopedThresholds>> {
    rules
        .into_iter()
        .map(|r| {
            Ok(ScopedThresholds {
                blockchain: r.blockchain,
                network: r.network,
                currency: r.currency,
                thresholds: spec_from_wire(r.thresholds)?,
            })
        })
        .collect()
}

fn to_wire(container: &RulesContainer) -> ContainerWire {
    ContainerWire {
        version: RULES_CONTAINER_VERSION,
        issued_at: container.issued_at,
        users: container
            .users
            .iter()
            .map(|u| UserWire {
                id: u.id.clone(),
                public_key: *u.public_key.as_bytes(),
                roles: u.roles.clone(),
            })
            .collect(),
        groups: container
            .groups
            .iter()
            .map(|g| GroupWire {
                id: g.id.clone(),
                user_ids: g.user_ids.clone(),
            })
            .collect(),
        minimum_super_admin_signatures: container.minimum_super_admin_signatures,
        governance_thresholds: spec_to_wire(&container.governance_thresholds),
        address_rules: scoped_to_wire(&container.address_rules),
        asset_rules: scoped_to_wire(&container.asset_rules),
        transaction_rules: scoped_to_wire(&container.transaction_rules),
    }
}

fn spec_to_wire(spec: &ApprovalThresholdSpec) -> SpecWire {
    SpecWire {
        parallel: spec
            .parallel
            .iter()
            .map(|chain| {
                chain
                    .requirements
                    .iter()
                    .map(|r| RequirementWire {
                        group_id: r.group_id.clone(),
                        minimum_signatures: r.minimum_signatures.get(),
                    })
                    .collect()
            })
            .collect(),
    }
}

fn scoped_to_wire(rules: &[ScopedThresholds]) -> Vec<ScopedWire> {
    rules
        .iter()
        .map(|r| ScopedWire {
            blockchain: r.blockchain.clone(),
            network: r.network.clone(),
            currency: r.currency.clone(),
            thresholds: spec_to_wire(&r.thresholds),
        })
        .collect()
}
