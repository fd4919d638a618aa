//! Typed metadata index kept alongside the payloads.
//!
//! One [`EntryMeta`] per stored key, plus a write-ordered map that yields the
//! least-recently-written entry in O(log n). The index is persisted on the
//! medium as a single JSON document under [`INDEX_KEY`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::key::Namespace;

/// Reserved medium key for the persisted index. Never collides with a
/// namespaced key because it has no namespace prefix.
pub const INDEX_KEY: &str = "__lingo_cache_index__";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub namespace: Namespace,
    /// Write time, ms since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub stored_at: u64,
    /// Time-to-live in ms.
    #[serde(rename = "expiresIn")]
    pub ttl_ms: u64,
    pub size: u64,
    /// Monotonic write sequence; lower means written earlier.
    pub seq: u64,
}

impl EntryMeta {
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis.saturating_sub(self.stored_at) >= self.ttl_ms
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    next_seq: u64,
    entries: BTreeMap<String, EntryMeta>,
}

#[derive(Debug, Default)]
pub struct EntryIndex {
    entries: HashMap<String, EntryMeta>,
    by_seq: BTreeMap<u64, String>,
    next_seq: u64,
    total_size: u64,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&EntryMeta> {
        self.entries.get(key)
    }

    /// Record a write. Replaces any previous entry for `key` and moves it to
    /// the newest position.
    pub fn insert(
        &mut self,
        key: &str,
        namespace: Namespace,
        stored_at: u64,
        ttl_ms: u64,
        size: u64,
    ) -> Option<EntryMeta> {
        let previous = self.remove(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key.to_string());
        self.total_size += size;
        self.entries.insert(
            key.to_string(),
            EntryMeta {
                namespace,
                stored_at,
                ttl_ms,
                size,
                seq,
            },
        );
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<EntryMeta> {
        let meta = self.entries.remove(key)?;
        self.by_seq.remove(&meta.seq);
        self.total_size = self.total_size.saturating_sub(meta.size);
        Some(meta)
    }

    /// Least-recently-written key.
    pub fn oldest(&self) -> Option<&str> {
        self.by_seq.values().next().map(String::as_str)
    }

    /// Expired keys, oldest write first.
    pub fn expired_keys(&self, now_millis: u64) -> Vec<String> {
        self.by_seq
            .values()
            .filter(|k| {
                self.entries
                    .get(k.as_str())
                    .map(|m| m.is_expired(now_millis))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn keys_in(&self, namespace: Namespace) -> Vec<String> {
        self.by_seq
            .values()
            .filter(|k| {
                self.entries
                    .get(k.as_str())
                    .map(|m| m.namespace == namespace)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Payload bytes of entries that have not expired at `now_millis`.
    pub fn live_size(&self, now_millis: u64) -> u64 {
        self.entries
            .values()
            .filter(|m| !m.is_expired(now_millis))
            .map(|m| m.size)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            next_seq: self.next_seq,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        serde_json::to_vec(&snapshot)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let snapshot: IndexSnapshot = serde_json::from_slice(bytes)?;
        let mut index = Self::new();
        let mut max_seq = 0;
        for (key, meta) in snapshot.entries {
            max_seq = max_seq.max(meta.seq + 1);
            index.by_seq.insert(meta.seq, key.clone());
            index.total_size += meta.size;
            index.entries.insert(key, meta);
        }
        index.next_seq = snapshot.next_seq.max(max_seq);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_order_and_overwrite() {
        let mut idx = EntryIndex::new();
        idx.insert("a", Namespace::Image, 0, 1000, 10);
        idx.insert("b", Namespace::Image, 1, 1000, 20);
        assert_eq!(idx.oldest(), Some("a"));
        assert_eq!(idx.total_size(), 30);

        // Rewriting "a" makes it the newest and replaces its size.
        let prev = idx.insert("a", Namespace::Image, 2, 1000, 5);
        assert_eq!(prev.unwrap().size, 10);
        assert_eq!(idx.oldest(), Some("b"));
        assert_eq!(idx.total_size(), 25);
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_expiry_boundary() {
        let meta = EntryMeta {
            namespace: Namespace::Translation,
            stored_at: 1_000,
            ttl_ms: 1_000,
            size: 1,
            seq: 0,
        };
        assert!(!meta.is_expired(1_999));
        assert!(meta.is_expired(2_000));
    }

    #[test]
    fn test_expired_and_namespace_listing() {
        let mut idx = EntryIndex::new();
        idx.insert("t1", Namespace::Translation, 0, 100, 1);
        idx.insert("v1", Namespace::Voice, 0, 10_000, 1);
        idx.insert("t2", Namespace::Translation, 50, 10_000, 1);
        assert_eq!(idx.expired_keys(200), vec!["t1".to_string()]);
        assert_eq!(idx.keys_in(Namespace::Translation), vec!["t1", "t2"]);
        assert_eq!(idx.live_size(200), 2);
    }

    #[test]
    fn test_snapshot_uses_metadata_field_names() {
        let mut idx = EntryIndex::new();
        idx.insert("voice:x", Namespace::Voice, 42, 7, 3);
        let json: serde_json::Value = serde_json::from_slice(&idx.to_json().unwrap()).unwrap();
        assert_eq!(json["entries"]["voice:x"]["timestamp"], 42);
        assert_eq!(json["entries"]["voice:x"]["expiresIn"], 7);

        let restored = EntryIndex::from_json(&idx.to_json().unwrap()).unwrap();
        assert_eq!(restored.get("voice:x"), idx.get("voice:x"));
        assert_eq!(restored.total_size(), 3);
    }

    #[test]
    fn test_restored_index_keeps_sequence_monotonic() {
        let mut idx = EntryIndex::new();
        idx.insert("a", Namespace::Image, 0, 100, 1);
        idx.insert("b", Namespace::Image, 0, 100, 1);
        let mut restored = EntryIndex::from_json(&idx.to_json().unwrap()).unwrap();
        restored.insert("c", Namespace::Image, 0, 100, 1);
        assert_eq!(restored.get("c").unwrap().seq, 2);
        assert_eq!(restored.oldest(), Some("a"));
    }
}
