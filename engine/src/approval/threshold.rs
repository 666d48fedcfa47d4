//! The "who must approve" model.
//!
//! One shape serves every subject: governance rule changes, whitelisted
//! addresses, whitelisted assets, and transaction requests. Only the
//! resolution of *which* spec applies differs per subject; see
//! [`crate::rules::RulesContainer`].
//!
//! ```text
//! ApprovalThresholdSpec
//!   parallel: [ SequentialChain, ... ]       any one chain suffices
//!     SequentialChain
//!       requirements: [ GroupRequirement, ... ]   every requirement, in order
//!         GroupRequirement { group_id, minimum_signatures }
//! ```

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, Result};

/// `minimum_signatures` distinct members of external group `group_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRequirement {
    pub group_id: String,
    pub minimum_signatures: NonZeroU32,
}

impl GroupRequirement {
    /// A zero minimum would make the requirement vacuous, so it is refused.
    pub fn new(group_id: impl Into<String>, minimum_signatures: u32) -> Result<Self> {
        let group_id = group_id.into();
        let minimum_signatures = NonZeroU32::new(minimum_signatures).ok_or_else(|| {
            GovernanceError::InvalidConfig(format!(
                "group requirement for {group_id} must require at least one signature"
            ))
        })?;
        Ok(Self {
            group_id,
            minimum_signatures,
        })
    }
}

/// An ordered list of requirements, each filled by different people.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequentialChain {
    pub requirements: Vec<GroupRequirement>,
}

impl SequentialChain {
    pub fn new(requirements: Vec<GroupRequirement>) -> Self {
        Self { requirements }
    }

    /// Total signers the chain consumes when satisfied.
    pub fn total_signatures(&self) -> u64 {
        self.requirements
            .iter()
            .map(|r| u64::from(r.minimum_signatures.get()))
            .sum()
    }
}

/// Alternative approval chains; satisfied when any one chain is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalThresholdSpec {
    pub parallel: Vec<SequentialChain>,
}

impl ApprovalThresholdSpec {
    pub fn new(parallel: Vec<SequentialChain>) -> Self {
        Self { parallel }
    }

    /// Build from `(group, minimum)` tuples, one inner list per chain.
    ///
    /// ```
    /// use custody_governance::approval::ApprovalThresholdSpec;
    ///
    /// let spec = ApprovalThresholdSpec::from_tuples(&[
    ///     &[("compliance", 2), ("treasury", 1)],
    ///     &[("board", 3)],
    /// ])
    /// .unwrap();
    /// assert_eq!(spec.parallel.len(), 2);
    /// ```
    pub fn from_tuples(chains: &[&[(&str, u32)]]) -> Result<Self> {
        let parallel = chains
            .iter()
            .map(|chain| {
                chain
                    .iter()
                    .map(|(group, min)| GroupRequirement::new(*group, *min))
                    .collect::<Result<Vec<_>>>()
                    .map(SequentialChain::new)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { parallel })
    }

    pub fn is_empty(&self) -> bool {
        self.parallel.is_empty()
    }

    /// Every group id referenced by any requirement.
    pub fn referenced_groups(&self) -> impl Iterator<Item = &str> {
        self.parallel
            .iter()
            .flat_map(|chain| chain.requirements.iter())
            .map(|req| req.group_id.as_str())
    }
}
