//! # Canonical Payload Binder
//!
//! A signed payload travels twice: once as the exact string that was hashed
//! and signed (`payload_as_string`), and once as a free-form convenience
//! object. Signatures only cover the string. Anyone who can rewrite the
//! free-form object without touching the string could show a reviewer one
//! destination address while the signatures vouch for another.
//!
//! [`CanonicalPayload`] closes that hole structurally. Its parsed tree is
//! private and can only be produced by [`CanonicalPayload::bind`] from the
//! canonical string itself. Every trusted accessor in the crate reads through
//! [`CanonicalPayload::extract`] and friends; there is no constructor that
//! accepts an already-parsed tree.
//!
//! Parsing is strict:
//!
//! - duplicate object keys are rejected, since parsers disagree on which
//!   occurrence wins;
//! - keys in `serde_json`'s private namespace are rejected, since
//!   `arbitrary_precision` would read such an object back as a number;
//! - numbers keep their exact source text (`serde_json` is built with
//!   `arbitrary_precision`), so monetary amounts never round-trip through
//!   `f64` or `u64`.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;
use serde_json::Value;

use crate::config::MAX_CANONICAL_PAYLOAD_BYTES;
use crate::crypto::{sha256, Digest256};
use crate::error::{GovernanceError, Result};

/// A canonical string bound to the tree parsed from it and its digest.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalPayload {
    canonical: String,
    tree: Value,
    digest: Digest256,
}

impl CanonicalPayload {
    /// Parse `canonical` and bind it to its SHA-256 digest.
    ///
    /// # Errors
    ///
    /// [`GovernanceError::MalformedPayload`] if the string is oversized, not
    /// well-formed JSON, contains duplicate object keys, or uses a reserved
    /// `$serde_json::private::` key.
    pub fn bind(canonical: impl Into<String>) -> Result<Self> {
        Self::bind_with_limit(canonical, MAX_CANONICAL_PAYLOAD_BYTES)
    }

    /// [`bind`](Self::bind) with an explicit size limit in bytes.
    pub fn bind_with_limit(canonical: impl Into<String>, max_bytes: usize) -> Result<Self> {
        let canonical = canonical.into();
        if canonical.len() > max_bytes {
            return Err(GovernanceError::MalformedPayload {
                reason: format!(
                    "payload is {} bytes, limit is {max_bytes}",
                    canonical.len()
                ),
            });
        }

        serde_json::from_str::<UniqueKeys>(&canonical).map_err(|e| {
            GovernanceError::MalformedPayload {
                reason: e.to_string(),
            }
        })?;
        reject_reserved_keys(&canonical)?;
        let tree: Value =
            serde_json::from_str(&canonical).map_err(|e| GovernanceError::MalformedPayload {
                reason: e.to_string(),
            })?;

        let digest = sha256(canonical.as_bytes());
        Ok(Self {
            canonical,
            tree,
            digest,
        })
    }

    /// The exact string that was hashed and signed.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.canonical.as_bytes()
    }

    /// SHA-256 of the canonical string.
    pub fn digest(&self) -> &Digest256 {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Value at a JSON pointer such as `/destination/address`.
    ///
    /// An explicit JSON `null` counts as absent.
    pub fn extract(&self, path: &str) -> Result<&Value> {
        match self.tree.pointer(path) {
            Some(Value::Null) | None => Err(GovernanceError::FieldNotFound {
                path: path.to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    pub fn extract_str(&self, path: &str) -> Result<&str> {
        self.extract(path)?
            .as_str()
            .ok_or_else(|| GovernanceError::field_type(path, "string"))
    }

    /// Like [`extract_str`](Self::extract_str) but absence is `None`. A
    /// present value of the wrong type is still an error.
    pub fn extract_optional_str(&self, path: &str) -> Result<Option<&str>> {
        optional(self.extract_str(path))
    }

    pub fn extract_u64(&self, path: &str) -> Result<u64> {
        self.extract(path)?
            .as_u64()
            .ok_or_else(|| GovernanceError::field_type(path, "unsigned integer"))
    }

    pub fn extract_u32(&self, path: &str) -> Result<u32> {
        let value = self.extract_u64(path)?;
        u32::try_from(value).map_err(|_| GovernanceError::field_type(path, "u32"))
    }

    /// An arbitrary-precision decimal, given either as a JSON string or a
    /// JSON number. The source text is kept verbatim.
    pub fn extract_decimal(&self, path: &str) -> Result<DecimalAmount> {
        let text = match self.extract(path)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(GovernanceError::field_type(path, "decimal")),
        };
        DecimalAmount::parse(&text).ok_or_else(|| GovernanceError::field_type(path, "decimal"))
    }
}

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GovernanceError::FieldNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Decimal amounts
// ---------------------------------------------------------------------------

/// A decimal number carried as its exact text: `-?digits(.digits)?`.
///
/// No exponent notation, no leading `+`, no float conversion anywhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DecimalAmount(String);

impl DecimalAmount {
    pub fn parse(text: &str) -> Option<Self> {
        let unsigned = text.strip_prefix('-').unwrap_or(text);
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || frac_part.is_some_and(|f| !all_digits(f)) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Duplicate-key detection
// ---------------------------------------------------------------------------

/// Walks a JSON document and fails on the first object with a repeated key.
const RESERVED_KEY_PREFIX: &str = "$serde_json::private::";

/// Scans the raw text of an already well-formed document for object keys in
/// the reserved namespace. Keys are unescaped before comparison.
fn reject_reserved_keys(canonical: &str) -> Result<()> {
    let bytes = canonical.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'"' {
            i += if bytes[i] == b'\\' { 2 } else { 1 };
        }
        let end = (i + 1).min(bytes.len());
        i = end;

        let mut next = i;
        while next < bytes.len() && bytes[next].is_ascii_whitespace() {
            next += 1;
        }
        if bytes.get(next) != Some(&b':') {
            continue;
        }
        let key: String = serde_json::from_str(&canonical[start..end]).map_err(|e| {
            GovernanceError::MalformedPayload {
                reason: e.to_string(),
            }
        })?;
        if key.starts_with(RESERVED_KEY_PREFIX) {
            return Err(GovernanceError::MalformedPayload {
                reason: format!("reserved object key {key:?}"),
            });
        }
    }
    Ok(())
}

struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<UniqueKeys, A::Error> {
        let mut seen = BTreeSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format!("duplicate key {key:?}")));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}
