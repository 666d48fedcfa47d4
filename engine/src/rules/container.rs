//! The decoded governance policy.
//!
//! A [`RulesContainer`] is plain data. Decoding one proves nothing about who
//! authored it; only [`crate::envelope::verify_rules`] and the verified
//! envelope turn it into policy the engine acts on.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalThresholdSpec, Approver};
use crate::crypto::SignerPublicKey;
use crate::error::{GovernanceError, Result};
use crate::quorum::{QuorumResult, SignerDirectory};

/// Roles a user can hold inside the governance rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Approver,
    Operator,
}

/// A user known to the rules, with the key their approvals are checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleUser {
    pub id: String,
    pub public_key: SignerPublicKey,
    pub roles: Vec<Role>,
}

impl RuleUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// An external approval group and its members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    pub user_ids: Vec<String>,
}

/// A threshold override scoped to a blockchain, network, and/or currency.
/// `None` matches anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedThresholds {
    pub blockchain: Option<String>,
    pub network: Option<String>,
    pub currency: Option<String>,
    pub thresholds: ApprovalThresholdSpec,
}

impl ScopedThresholds {
    /// Number of non-wildcard fields if the rule matches `scope`.
    fn specificity(&self, scope: &SubjectScope) -> Option<usize> {
        let fields = [
            (&self.blockchain, &scope.blockchain),
            (&self.network, &scope.network),
            (&self.currency, &scope.currency),
        ];
        let mut score = 0;
        for (rule, subject) in fields {
            match (rule, subject) {
                (None, _) => {}
                (Some(want), Some(have)) if want.eq_ignore_ascii_case(have) => score += 1,
                (Some(_), _) => return None,
            }
        }
        Some(score)
    }
}

/// Which list of scoped overrides a subject resolves against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleSet {
    AddressWhitelisting,
    AssetWhitelisting,
    Transactions,
}

/// The coordinates a subject is resolved by.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectScope {
    pub blockchain: Option<String>,
    pub network: Option<String>,
    pub currency: Option<String>,
}

/// Governance rules: users, groups, and per-subject approval thresholds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesContainer {
    /// Unix seconds at which the rules were issued.
    pub issued_at: i64,
    pub users: Vec<RuleUser>,
    pub groups: Vec<RuleGroup>,
    /// Distinct SuperAdmin signatures the container demands for itself.
    /// Raises, never lowers, the caller's configured minimum.
    pub minimum_super_admin_signatures: u32,
    /// Approvals required to change these rules.
    pub governance_thresholds: ApprovalThresholdSpec,
    pub address_rules: Vec<ScopedThresholds>,
    pub asset_rules: Vec<ScopedThresholds>,
    pub transaction_rules: Vec<ScopedThresholds>,
}

impl RulesContainer {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }

    pub fn user(&self, id: &str) -> Option<&RuleUser> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Ids of every group listing `user_id`.
    pub fn groups_of(&self, user_id: &str) -> BTreeSet<String> {
        self.groups
            .iter()
            .filter(|g| g.user_ids.iter().any(|u| u == user_id))
            .map(|g| g.id.clone())
            .collect()
    }

    /// Every user's approval key.
    pub fn approver_directory(&self) -> Result<SignerDirectory> {
        SignerDirectory::from_entries(self.users.iter().map(|u| (u.id.clone(), u.public_key)))
    }

    /// Users holding the SuperAdmin role, as declared by these rules.
    pub fn super_admin_directory(&self) -> Result<SignerDirectory> {
        SignerDirectory::from_entries(
            self.users
                .iter()
                .filter(|u| u.has_role(Role::SuperAdmin))
                .map(|u| (u.id.clone(), u.public_key)),
        )
    }

    /// Attach group memberships to the signers of a verified quorum.
    pub fn approvers(&self, verified: &QuorumResult) -> Vec<Approver> {
        verified
            .distinct_signers
            .iter()
            .map(|id| Approver {
                signer_id: id.clone(),
                groups: self.groups_of(id),
            })
            .collect()
    }

    /// The most specific override in `set` matching `scope`. Ties go to the
    /// rule listed first.
    pub fn resolve(&self, set: RuleSet, scope: &SubjectScope) -> Option<&ApprovalThresholdSpec> {
        let rules = match set {
            RuleSet::AddressWhitelisting => &self.address_rules,
            RuleSet::AssetWhitelisting => &self.asset_rules,
            RuleSet::Transactions => &self.transaction_rules,
        };
        let mut best: Option<(usize, &ScopedThresholds)> = None;
        for rule in rules {
            if let Some(score) = rule.specificity(scope) {
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, rule));
                }
            }
        }
        best.map(|(_, rule)| &rule.thresholds)
    }

    /// Structural checks. Violations are malformed input.
    pub fn validate(&self) -> Result<()> {
        let mut user_ids = HashSet::new();
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(GovernanceError::malformed_container("empty user id"));
            }
            if !user_ids.insert(user.id.as_str()) {
                return Err(GovernanceError::malformed_container(format!(
                    "duplicate user id {}",
                    user.id
                )));
            }
        }

        let mut group_ids = HashSet::new();
        for group in &self.groups {
            if group.id.trim().is_empty() {
                return Err(GovernanceError::malformed_container("empty group id"));
            }
            if !group_ids.insert(group.id.as_str()) {
                return Err(GovernanceError::malformed_container(format!(
                    "duplicate group id {}",
                    group.id
                )));
            }
            let mut members = HashSet::new();
            for member in &group.user_ids {
                if !user_ids.contains(member.as_str()) {
                    return Err(GovernanceError::malformed_container(format!(
                        "group {} lists unknown user {member}",
                        group.id
                    )));
                }
                if !members.insert(member.as_str()) {
                    return Err(GovernanceError::malformed_container(format!(
                        "group {} lists user {member} twice",
                        group.id
                    )));
                }
            }
        }

        let scoped = self
            .address_rules
            .iter()
            .chain(&self.asset_rules)
            .chain(&self.transaction_rules);
        for rule in scoped.clone() {
            let fields = [&rule.blockchain, &rule.network, &rule.currency];
            if fields.iter().any(|f| f.as_deref().is_some_and(|v| v.trim().is_empty())) {
                return Err(GovernanceError::malformed_container(
                    "scoped rule has an empty scope field",
                ));
            }
        }

        let specs =
            std::iter::once(&self.governance_thresholds).chain(scoped.map(|r| &r.thresholds));
        for spec in specs {
            if let Some(unknown) = spec.referenced_groups().find(|g| !group_ids.contains(g)) {
                return Err(GovernanceError::malformed_container(format!(
                    "threshold references unknown group {unknown}"
                )));
            }
        }

        Ok(())
    }
}
