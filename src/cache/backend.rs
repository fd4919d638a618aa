//! Physical storage media behind a [`CacheStore`](super::CacheStore).

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::error::{Error, ErrorContext};
use crate::Result;

/// A key/value medium that may run out of space.
///
/// `write` returns [`Error::StorageQuotaExceeded`] when the medium's own quota
/// would be exceeded; the store reacts to that by evicting and retrying once.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<bool>;
    async fn keys(&self) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

/// Synchronous, string-valued key/value store, the way browser local storage
/// works: values are strings, and the quota counts key plus value length.
///
/// UTF-8 payloads are stored as-is; anything else is base64 encoded.
pub struct MemoryMedium {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

const TEXT_TAG: &str = "t:";
const BASE64_TAG: &str = "b:";

impl MemoryMedium {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: None,
        }
    }

    /// Medium that rejects writes once stored keys and values exceed `bytes`.
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Bytes currently counted against the quota.
    pub fn used_bytes(&self) -> u64 {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    // Synchronous core; the async trait methods only wrap these.
    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|raw| decode_value(key, raw)).transpose()
    }

    fn set_sync(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = encode_value(value);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(quota) = self.quota {
            let used: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let needed = (key.len() + encoded.len()) as u64;
            if used + needed > quota {
                return Err(Error::quota_exceeded(format!(
                    "memory medium needs {} bytes for '{}', {} of {} in use",
                    needed, key, used, quota
                )));
            }
        }
        entries.insert(key.to_string(), encoded);
        Ok(())
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn encode_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => format!("{}{}", TEXT_TAG, text),
        Err(_) => format!("{}{}", BASE64_TAG, STANDARD.encode(value)),
    }
}

pub(super) fn decode_value(key: &str, raw: &str) -> Result<Vec<u8>> {
    if let Some(text) = raw.strip_prefix(TEXT_TAG) {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(b64) = raw.strip_prefix(BASE64_TAG) {
        return STANDARD.decode(b64).map_err(|e| {
            Error::storage_with_context(
                format!("corrupt base64 value: {}", e),
                ErrorContext::new().with_field_path(key).with_source("string_medium"),
            )
        });
    }
    Err(Error::storage_with_context(
        "value has no encoding tag",
        ErrorContext::new().with_field_path(key).with_source("string_medium"),
    ))
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_sync(key)
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_sync(key, value)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Asynchronous binary blob store on disk, addressed by URL-like keys.
///
/// Each key maps to one file whose name is the URL-safe base64 of the key.
pub struct DirectoryMedium {
    root: PathBuf,
    quota: Option<u64>,
    used: AtomicU64,
}

const BLOB_EXT: &str = "blob";

impl DirectoryMedium {
    /// Open (or create) a blob directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_quota(root, None).await
    }

    pub async fn open_with_quota(root: impl AsRef<Path>, quota: Option<u64>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let mut used = 0u64;
        let mut dir = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if is_blob(&entry.path()) {
                used += entry.metadata().await?.len();
            }
        }
        debug!(root = %root.display(), used_bytes = used, "blob directory opened");

        Ok(Self {
            root,
            quota,
            used: AtomicU64::new(used),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", URL_SAFE_NO_PAD.encode(key.as_bytes()), BLOB_EXT))
    }

    async fn existing_len(path: &Path) -> Result<u64> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_blob(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXT)
}

#[async_trait]
impl StorageMedium for DirectoryMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let previous = Self::existing_len(&path).await?;
        let new_len = value.len() as u64;

        if let Some(quota) = self.quota {
            let used = self.used_bytes().saturating_sub(previous);
            if used + new_len > quota {
                return Err(Error::quota_exceeded(format!(
                    "blob directory needs {} bytes for '{}', {} of {} in use",
                    new_len, key, used, quota
                )));
            }
        }

        // Write-then-rename so readers never observe a torn blob.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.used.fetch_add(new_len, Ordering::SeqCst);
        self.used.fetch_sub(previous, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        let len = Self::existing_len(&path).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.used.fetch_sub(len, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !is_blob(&path) {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
                .and_then(|b| String::from_utf8(b).ok());
            if let Some(key) = decoded {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_medium_text_and_binary() {
        let m = MemoryMedium::new();
        m.write("translation:a", b"hola").await.unwrap();
        m.write("voice:b", &[0xff, 0x00, 0xfe]).await.unwrap();
        assert_eq!(m.read("translation:a").await.unwrap().unwrap(), b"hola");
        assert_eq!(
            m.read("voice:b").await.unwrap().unwrap(),
            vec![0xff, 0x00, 0xfe]
        );
        assert!(m.read("missing").await.unwrap().is_none());
        assert!(m.remove("translation:a").await.unwrap());
        assert!(!m.remove("translation:a").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_medium_quota() {
        let m = MemoryMedium::with_quota(20);
        m.write("k1", b"0123456789").await.unwrap();
        let err = m.write("k2", b"0123456789").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        // Overwriting the same key does not double count.
        m.write("k1", b"9876543210").await.unwrap();
        assert_eq!(m.used_bytes(), 2 + 2 + 10);
    }

    #[tokio::test]
    async fn test_directory_medium_round_trip_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let m = DirectoryMedium::open(dir.path()).await.unwrap();
        m.write("https://cache.local/voice/abc", b"RIFF....")
            .await
            .unwrap();
        assert_eq!(
            m.read("https://cache.local/voice/abc").await.unwrap().unwrap(),
            b"RIFF...."
        );
        assert_eq!(m.keys().await.unwrap(), vec!["https://cache.local/voice/abc"]);
        assert_eq!(m.used_bytes(), 8);
        assert!(m.remove("https://cache.local/voice/abc").await.unwrap());
        assert_eq!(m.used_bytes(), 0);
        assert!(m.read("https://cache.local/voice/abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_medium_quota_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let m = DirectoryMedium::open_with_quota(dir.path(), Some(10))
                .await
                .unwrap();
            m.write("a", &[1u8; 6]).await.unwrap();
            assert!(m.write("b", &[1u8; 6]).await.unwrap_err().is_quota_exceeded());
            m.write("a", &[2u8; 10]).await.unwrap();
        }
        let reopened = DirectoryMedium::open(dir.path()).await.unwrap();
        assert_eq!(reopened.used_bytes(), 10);
    }
}
