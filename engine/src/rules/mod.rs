//! Governance rules: the decoded policy model and its binary codec.

pub mod codec;
pub mod container;

pub use codec::{decode, decode_with_limit, encode};
pub use container::{
    Role, RuleGroup, RuleSet, RuleUser, RulesContainer, ScopedThresholds, SubjectScope,
};
