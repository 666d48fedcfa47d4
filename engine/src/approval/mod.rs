//! # Approval Thresholds
//!
//! The shared "who must approve" model and its evaluator. Subject-specific
//! resolution (which spec applies to a given address, asset, request, or
//! rules change) lives with the subjects, not here.

pub mod evaluator;
pub mod threshold;

pub use evaluator::{evaluate, is_satisfied, Approver, ThresholdOutcome};
pub use threshold::{ApprovalThresholdSpec, GroupRequirement, SequentialChain};
