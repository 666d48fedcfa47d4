//! Approval threshold evaluation.
//!
//! A [`SequentialChain`] is satisfied when every requirement gets its
//! minimum number of signers from its group, and no signer is counted for
//! two requirements of the same chain. Parallel chains are evaluated
//! independently: a signer consumed by one chain is still available to the
//! next.
//!
//! "No signer counted twice" is a bipartite matching problem (requirement
//! slots on one side, signers on the other). Greedy assignment in list order
//! can miss a valid assignment when a signer belongs to several groups, so
//! the evaluator searches with augmenting paths instead. The answer does not
//! depend on the order signatures arrived in.
//!
//! Fail closed: an empty `parallel` list and a chain without requirements
//! are both unsatisfied.

use std::collections::{BTreeMap, BTreeSet};
use std::iter;

use super::threshold::{ApprovalThresholdSpec, SequentialChain};

/// A signer with a verified signature and its external group memberships.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approver {
    pub signer_id: String,
    pub groups: BTreeSet<String>,
}

impl Approver {
    pub fn new<I, S>(signer_id: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signer_id: signer_id.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

/// Which alternative, if any, was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdOutcome {
    pub satisfied_chain: Option<usize>,
}

impl ThresholdOutcome {
    pub fn is_satisfied(&self) -> bool {
        self.satisfied_chain.is_some()
    }
}

/// True if any parallel chain of `spec` is satisfied by `approvers`.
pub fn is_satisfied(spec: &ApprovalThresholdSpec, approvers: &[Approver]) -> bool {
    evaluate(spec, approvers).is_satisfied()
}

/// Evaluate `spec`, reporting the first satisfied chain.
pub fn evaluate(spec: &ApprovalThresholdSpec, approvers: &[Approver]) -> ThresholdOutcome {
    let approvers = merge_by_signer(approvers);
    let satisfied_chain = spec
        .parallel
        .iter()
        .position(|chain| chain_satisfied(chain, &approvers));
    ThresholdOutcome { satisfied_chain }
}

/// One entry per signer id; memberships of repeated entries are unioned.
fn merge_by_signer(approvers: &[Approver]) -> Vec<Approver> {
    let mut merged: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for approver in approvers {
        merged
            .entry(approver.signer_id.as_str())
            .or_default()
            .extend(approver.groups.iter().cloned());
    }
    merged
        .into_iter()
        .map(|(signer_id, groups)| Approver {
            signer_id: signer_id.to_string(),
            groups,
        })
        .collect()
}

fn chain_satisfied(chain: &SequentialChain, approvers: &[Approver]) -> bool {
    if chain.requirements.is_empty() {
        return false;
    }
    // Checked before allocating one slot per required signature.
    if chain.total_signatures() > approvers.len() as u64 {
        return false;
    }

    let slots: Vec<&str> = chain
        .requirements
        .iter()
        .flat_map(|req| {
            iter::repeat(req.group_id.as_str()).take(req.minimum_signatures.get() as usize)
        })
        .collect();

    // assigned[approver] = slot currently held by that approver
    let mut assigned: Vec<Option<usize>> = vec![None; approvers.len()];
    for slot in 0..slots.len() {
        let mut visited = vec![false; approvers.len()];
        if !augment(slot, &slots, approvers, &mut assigned, &mut visited) {
            return false;
        }
    }
    true
}

fn augment(
    slot: usize,
    slots: &[&str],
    approvers: &[Approver],
    assigned: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for (idx, approver) in approvers.iter().enumerate() {
        if visited[idx] || !approver.groups.contains(slots[slot]) {
            continue;
        }
        visited[idx] = true;
        let free = match assigned[idx] {
            None => true,
            Some(held) => augment(held, slots, approvers, assigned, visited),
        };
        if free {
            assigned[idx] = Some(slot);
            return true;
        }
    }
    false
}
