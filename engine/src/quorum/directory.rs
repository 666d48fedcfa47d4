//! Signer directories: who may sign, and with which key.
//!
//! A directory is always supplied by the *caller* of a verification, never
//! by the document under verification. The engine borrows it for the
//! duration of one call and keeps no copy.

use std::collections::BTreeMap;

use crate::crypto::SignerPublicKey;
use crate::error::{GovernanceError, Result};

/// An immutable map from signer id to Ed25519 public key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerDirectory {
    keys: BTreeMap<String, SignerPublicKey>,
}

impl SignerDirectory {
    /// Build a directory, rejecting empty or duplicate signer ids.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, SignerPublicKey)>,
        S: Into<String>,
    {
        let mut keys = BTreeMap::new();
        for (id, key) in entries {
            let id = id.into();
            if id.trim().is_empty() {
                return Err(GovernanceError::InvalidConfig(
                    "signer id must not be empty".into(),
                ));
            }
            if keys.insert(id.clone(), key).is_some() {
                return Err(GovernanceError::InvalidConfig(format!(
                    "duplicate signer id in directory: {id}"
                )));
            }
        }
        Ok(Self { keys })
    }

    pub fn get(&self, signer_id: &str) -> Option<&SignerPublicKey> {
        self.keys.get(signer_id)
    }

    pub fn contains(&self, signer_id: &str) -> bool {
        self.keys.contains_key(signer_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SignerPublicKey)> {
        self.keys.iter().map(|(id, key)| (id.as_str(), key))
    }
}

/// The SuperAdmin trust anchor: the directory of SuperAdmin keys plus the
/// minimum number of distinct SuperAdmins that must ratify a rules
/// container.
///
/// Supplied out-of-band by the caller's configuration; see
/// [`EngineConfig::super_admin_quorum`](crate::config::EngineConfig::super_admin_quorum).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuperAdminQuorum {
    directory: SignerDirectory,
    minimum_valid: usize,
}

impl SuperAdminQuorum {
    /// Validates `1 <= minimum_valid <= directory.len()`.
    pub fn new(directory: SignerDirectory, minimum_valid: usize) -> Result<Self> {
        if minimum_valid == 0 {
            return Err(GovernanceError::InvalidConfig(
                "minimum SuperAdmin signatures must be at least 1".into(),
            ));
        }
        if minimum_valid > directory.len() {
            return Err(GovernanceError::InvalidConfig(format!(
                "minimum SuperAdmin signatures ({minimum_valid}) exceeds directory size ({})",
                directory.len()
            )));
        }
        Ok(Self {
            directory,
            minimum_valid,
        })
    }

    pub fn directory(&self) -> &SignerDirectory {
        &self.directory
    }

    pub fn minimum_valid(&self) -> usize {
        self.minimum_valid
    }
}
