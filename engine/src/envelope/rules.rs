//! Ratifying a rules container.
//!
//! The order is fixed: decode the container only far enough to learn the
//! quorum it asks for, verify the SuperAdmin signatures over the raw bytes,
//! and only then hand out the decoded policy as [`TrustedRules`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::document::RulesBundle;
use crate::config::MAX_RULES_CONTAINER_BYTES;
use crate::crypto::{sha256, Digest256};
use crate::error::Result;
use crate::quorum::{verify_quorum, SuperAdminQuorum};
use crate::rules::{self, RulesContainer};

/// A rules container ratified by a SuperAdmin quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedRules {
    container: RulesContainer,
    digest: Digest256,
    ratified_by: BTreeSet<String>,
}

impl TrustedRules {
    pub fn container(&self) -> &RulesContainer {
        &self.container
    }

    /// SHA-256 of the container bytes that were ratified.
    pub fn digest(&self) -> &Digest256 {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// SuperAdmins whose signatures counted.
    pub fn ratified_by(&self) -> &BTreeSet<String> {
        &self.ratified_by
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.container.issued_at()
    }
}

/// Decode and ratify `bundle` against the caller's SuperAdmin quorum.
pub fn verify_rules(bundle: &RulesBundle, quorum: &SuperAdminQuorum) -> Result<TrustedRules> {
    verify_rules_with_limit(bundle, quorum, MAX_RULES_CONTAINER_BYTES)
}

/// [`verify_rules`] with an explicit container size limit.
///
/// The effective quorum is the larger of the caller's minimum and the
/// minimum the container declares for itself.
pub fn verify_rules_with_limit(
    bundle: &RulesBundle,
    quorum: &SuperAdminQuorum,
    max_container_bytes: usize,
) -> Result<TrustedRules> {
    let bytes = bundle.container_bytes();

    // Not trusted yet: read only for the quorum parameter.
    let bootstrap = rules::decode_with_limit(bytes, max_container_bytes)?;
    let declared = usize::try_from(bootstrap.minimum_super_admin_signatures).unwrap_or(usize::MAX);
    let required = quorum.minimum_valid().max(declared);
    debug!(
        configured = quorum.minimum_valid(),
        declared,
        required,
        "ratifying rules container"
    );

    let result = verify_quorum(bytes, bundle.signatures(), quorum.directory(), required)?;

    let trusted = TrustedRules {
        container: bootstrap,
        digest: sha256(bytes),
        ratified_by: result.distinct_signers,
    };
    info!(
        digest = %trusted.digest_hex(),
        signers = trusted.ratified_by.len(),
        "rules container ratified"
    );
    Ok(trusted)
}
