//! Expiring, size-bounded cache store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::StorageMedium;
use super::clock::{Clock, SystemClock};
use super::index::{EntryIndex, INDEX_KEY};
use super::key::{CacheKey, Namespace};
use crate::Result;

/// Aggregate payload-size ceiling for one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreBudget {
    pub max_bytes: u64,
}

impl StoreBudget {
    pub fn bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Namespaced key/value cache with per-entry TTL and an aggregate size
/// budget, over one [`StorageMedium`].
///
/// - Expired entries are invisible to reads and are deleted lazily by the
///   read that finds them, or eagerly by [`sweep`](Self::sweep).
/// - After every write, expired entries are dropped and the
///   least-recently-written entries are evicted until the stored payload
///   size is within the budget.
/// - A write refused by the medium for lack of space triggers one eviction
///   pass and one retry before the failure is returned.
pub struct CacheStore {
    medium: Arc<dyn StorageMedium>,
    index: Mutex<EntryIndex>,
    budget: StoreBudget,
    clock: Arc<dyn Clock>,
    stats: AtomicStats,
}

impl CacheStore {
    pub async fn open(medium: Arc<dyn StorageMedium>, budget: StoreBudget) -> Result<Self> {
        Self::open_with_clock(medium, budget, Arc::new(SystemClock)).await
    }

    /// Open a store, restoring the persisted index if the medium has one.
    /// Payloads the index does not know about are deleted.
    pub async fn open_with_clock(
        medium: Arc<dyn StorageMedium>,
        budget: StoreBudget,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let index = match medium.read(INDEX_KEY).await? {
            Some(bytes) => EntryIndex::from_json(&bytes).unwrap_or_else(|e| {
                warn!(medium = medium.name(), error = %e, "cache index unreadable, starting empty");
                EntryIndex::new()
            }),
            None => EntryIndex::new(),
        };

        let mut orphans = 0usize;
        for key in medium.keys().await? {
            if key != INDEX_KEY && !index.contains(&key) {
                medium.remove(&key).await?;
                orphans += 1;
            }
        }

        info!(
            medium = medium.name(),
            entries = index.len(),
            bytes = index.total_size(),
            budget = budget.max_bytes,
            orphans,
            "cache store opened"
        );

        Ok(Self {
            medium,
            index: Mutex::new(index),
            budget,
            clock,
            stats: AtomicStats::default(),
        })
    }

    pub fn budget(&self) -> StoreBudget {
        self.budget
    }

    pub fn medium_name(&self) -> &'static str {
        self.medium.name()
    }

    /// Store `payload` under the key derived from `parts`. Last write wins.
    pub async fn put<S: AsRef<str>>(
        &self,
        namespace: Namespace,
        parts: &[S],
        payload: &[u8],
        ttl: Duration,
    ) -> Result<CacheKey> {
        let key = CacheKey::derive(namespace, parts);
        self.put_key(&key, payload, ttl).await?;
        Ok(key)
    }

    pub async fn put_key(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<()> {
        let size = payload.len() as u64;
        if size > self.budget.max_bytes {
            AtomicStats::bump(&self.stats.errors, 1);
            return Err(crate::Error::quota_exceeded(format!(
                "entry of {} bytes exceeds the {} byte budget",
                size, self.budget.max_bytes
            )));
        }

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let storage_key = key.storage_key();
        let mut index = self.index.lock().await;

        if let Err(e) = self.medium.write(&storage_key, payload).await {
            if !e.is_quota_exceeded() {
                AtomicStats::bump(&self.stats.errors, 1);
                return Err(e);
            }
            warn!(key = %storage_key, bytes = size, "medium quota exceeded, evicting and retrying");
            self.evict_at_least(&mut index, size).await;
            if let Err(e) = self.medium.write(&storage_key, payload).await {
                AtomicStats::bump(&self.stats.errors, 1);
                self.persist(&index).await;
                return Err(e);
            }
        }

        index.insert(
            &storage_key,
            key.namespace(),
            self.clock.now_millis(),
            ttl_ms,
            size,
        );
        AtomicStats::bump(&self.stats.writes, 1);
        debug!(key = %storage_key, bytes = size, ttl_ms, "cache put");

        self.evict_locked(&mut index).await;
        self.persist(&index).await;
        Ok(())
    }

    /// Fetch a live payload. Missing, expired and unreadable entries are all
    /// reported as `None`; faults are logged and counted.
    pub async fn get<S: AsRef<str>>(&self, namespace: Namespace, parts: &[S]) -> Option<Vec<u8>> {
        self.get_key(&CacheKey::derive(namespace, parts)).await
    }

    pub async fn get_key(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.try_get_key(key).await {
            Ok(value) => value,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors, 1);
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Like [`get_key`](Self::get_key) but surfaces medium faults.
    pub async fn try_get_key(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let storage_key = key.storage_key();
        let mut index = self.index.lock().await;

        let expired = match index.get(&storage_key) {
            None => {
                AtomicStats::bump(&self.stats.misses, 1);
                return Ok(None);
            }
            Some(meta) => meta.is_expired(self.clock.now_millis()),
        };

        if expired {
            index.remove(&storage_key);
            AtomicStats::bump(&self.stats.expirations, 1);
            AtomicStats::bump(&self.stats.misses, 1);
            debug!(key = %storage_key, "cache entry expired on read");
            let removed = self.medium.remove(&storage_key).await;
            self.persist(&index).await;
            removed?;
            return Ok(None);
        }

        match self.medium.read(&storage_key).await? {
            Some(bytes) => {
                AtomicStats::bump(&self.stats.hits, 1);
                Ok(Some(bytes))
            }
            None => {
                // Payload vanished underneath the index.
                index.remove(&storage_key);
                AtomicStats::bump(&self.stats.misses, 1);
                self.persist(&index).await;
                Ok(None)
            }
        }
    }

    pub async fn put_json<S: AsRef<str>, T: Serialize>(
        &self,
        namespace: Namespace,
        parts: &[S],
        value: &T,
        ttl: Duration,
    ) -> Result<CacheKey> {
        let bytes = serde_json::to_vec(value)?;
        self.put(namespace, parts, &bytes, ttl).await
    }

    /// Typed read. A payload that no longer decodes as `T` counts as a miss.
    pub async fn get_json<S: AsRef<str>, T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        parts: &[S],
    ) -> Option<T> {
        let key = CacheKey::derive(namespace, parts);
        let bytes = self.get_key(&key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                AtomicStats::bump(&self.stats.errors, 1);
                warn!(key = %key, error = %e, "cached payload does not decode");
                None
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let storage_key = key.storage_key();
        let mut index = self.index.lock().await;
        let known = index.remove(&storage_key).is_some();
        let removed = self.medium.remove(&storage_key).await;
        if known {
            self.persist(&index).await;
        }
        Ok(removed? || known)
    }

    /// Remove every entry of one namespace.
    pub async fn clear_namespace(&self, namespace: Namespace) -> Result<usize> {
        let mut index = self.index.lock().await;
        let keys = index.keys_in(namespace);
        let mut result = Ok(());
        for key in &keys {
            index.remove(key);
            if let Err(e) = self.medium.remove(key).await {
                result = Err(e);
            }
        }
        self.persist(&index).await;
        result.map(|_| keys.len())
    }

    /// Delete all expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> Result<usize> {
        let mut index = self.index.lock().await;
        let now = self.clock.now_millis();
        let mut removed = 0usize;
        let mut result = Ok(());
        for key in index.expired_keys(now) {
            index.remove(&key);
            removed += 1;
            if let Err(e) = self.medium.remove(&key).await {
                result = Err(e);
            }
        }
        AtomicStats::bump(&self.stats.expirations, removed as u64);
        if removed > 0 {
            self.persist(&index).await;
            debug!(medium = self.medium.name(), removed, "cache sweep");
        }
        result.map(|_| removed)
    }

    /// Maintenance pass: drop expired entries, then evict oldest writes until
    /// the stored size fits the budget. Returns how many entries were removed.
    pub async fn evict(&self) -> usize {
        let mut index = self.index.lock().await;
        let removed = self.evict_locked(&mut index).await;
        if removed > 0 {
            self.persist(&index).await;
        }
        removed
    }

    /// Periodically [`sweep`](Self::sweep) until `token` is cancelled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            warn!(error = %e, "periodic cache sweep failed");
                        }
                    }
                }
            }
        })
    }

    /// Payload bytes currently stored, including expired but unswept entries.
    pub async fn usage(&self) -> u64 {
        self.index.lock().await.total_size()
    }

    /// Payload bytes of live entries.
    pub async fn live_usage(&self) -> u64 {
        self.index.lock().await.live_size(self.clock.now_millis())
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.lock().await.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    async fn evict_locked(&self, index: &mut EntryIndex) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0usize;

        for key in index.expired_keys(now) {
            self.drop_entry(index, &key).await;
            AtomicStats::bump(&self.stats.expirations, 1);
            removed += 1;
        }

        while index.total_size() > self.budget.max_bytes {
            let Some(oldest) = index.oldest().map(str::to_string) else {
                break;
            };
            self.drop_entry(index, &oldest).await;
            AtomicStats::bump(&self.stats.evictions, 1);
            removed += 1;
        }

        if removed > 0 {
            debug!(
                medium = self.medium.name(),
                removed,
                bytes = index.total_size(),
                "cache eviction pass"
            );
        }
        removed
    }

    // Quota recovery: free at least `needed` payload bytes on top of the
    // normal pass, since the medium quota is independent of the budget.
    async fn evict_at_least(&self, index: &mut EntryIndex, needed: u64) {
        let before = index.total_size();
        self.evict_locked(index).await;
        while before.saturating_sub(index.total_size()) < needed {
            let Some(oldest) = index.oldest().map(str::to_string) else {
                break;
            };
            self.drop_entry(index, &oldest).await;
            AtomicStats::bump(&self.stats.evictions, 1);
        }
    }

    async fn drop_entry(&self, index: &mut EntryIndex, key: &str) {
        index.remove(key);
        if let Err(e) = self.medium.remove(key).await {
            AtomicStats::bump(&self.stats.errors, 1);
            warn!(key, error = %e, "failed to delete evicted cache payload");
        }
    }

    async fn persist(&self, index: &EntryIndex) {
        let written = match index.to_json() {
            Ok(bytes) => self.medium.write(INDEX_KEY, &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            AtomicStats::bump(&self.stats.errors, 1);
            warn!(medium = self.medium.name(), error = %e, "failed to persist cache index");
        }
    }
}
