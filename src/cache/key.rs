//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, ErrorContext};

/// Logical partition of the cache keyspace.
///
/// Every namespace owns a distinct key prefix, so identical semantic inputs
/// written under two namespaces never address the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Translation,
    Image,
    Voice,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Translation, Namespace::Image, Namespace::Voice];

    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Translation => "translation",
            Namespace::Image => "image",
            Namespace::Voice => "voice",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

impl std::str::FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.prefix() == s)
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("unknown cache namespace '{}'", s),
                    ErrorContext::new().with_details("expected translation, image or voice"),
                )
            })
    }
}

/// A namespaced cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    namespace: Namespace,
    digest: String,
}

impl CacheKey {
    /// Derive a key from semantic inputs, e.g. `["hello", "zh"]`.
    ///
    /// Equal parts always produce the same key; part boundaries are part of
    /// the hash input, so `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn derive<S: AsRef<str>>(namespace: Namespace, parts: &[S]) -> Self {
        Self {
            namespace,
            digest: rolling_hash(parts),
        }
    }

    /// Wrap an already-stable identifier (such as [`content_digest`]).
    pub fn from_digest(namespace: Namespace, digest: impl Into<String>) -> Self {
        Self {
            namespace,
            digest: digest.into(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Physical key used by the storage media: `{prefix}:{digest}`.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.digest)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace.prefix(), self.digest)
    }
}

const HASH_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const HASH_MULTIPLIER: u64 = 0x0000_0100_0000_01b3;
// Unit separator between parts.
const PART_SEPARATOR: u16 = 0x1f;

/// Non-cryptographic polynomial hash over the UTF-16 code units of `parts`,
/// rendered in base 36. Deterministic across runs and platforms.
pub fn rolling_hash<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hash = HASH_SEED;
    let mut units: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(PART_SEPARATOR as u64);
            units += 1;
        }
        for unit in part.as_ref().encode_utf16() {
            hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(unit as u64 + 1);
            units += 1;
        }
    }
    to_base36(finalize(hash ^ units))
}

/// Hex SHA-256 of raw bytes; stable identity for image and voice artifacts.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

// splitmix64 finalizer
fn finalize(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
