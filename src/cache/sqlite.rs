//! Durable string-keyed medium on SQLite.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::info;

use super::backend::{decode_value, encode_value, StorageMedium};
use crate::error::Error;
use crate::Result;

/// Synchronous string-valued key/value store persisted in one SQLite file.
///
/// Same value encoding and quota accounting as
/// [`MemoryMedium`](super::MemoryMedium): key plus encoded value length.
pub struct SqliteMedium {
    conn: Mutex<Connection>,
    path: PathBuf,
    quota: Option<u64>,
}

impl SqliteMedium {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_quota(path, None)
    }

    pub fn open_with_quota(path: impl AsRef<Path>, quota: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        info!(path = %path.display(), "string medium opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            quota,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently counted against the quota.
    pub fn used_bytes(&self) -> Result<u64> {
        let conn = self.conn.lock();
        used_excluding(&conn, None)
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| decode_value(key, &raw)).transpose()
    }

    fn set_sync(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = encode_value(value);
        let conn = self.conn.lock();
        if let Some(quota) = self.quota {
            let used = used_excluding(&conn, Some(key))?;
            let needed = (key.len() + encoded.len()) as u64;
            if used + needed > quota {
                return Err(Error::quota_exceeded(format!(
                    "sqlite medium needs {} bytes for '{}', {} of {} in use",
                    needed, key, used, quota
                )));
            }
        }
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value) VALUES (?1, ?2)",
            params![key, encoded],
        )?;
        Ok(())
    }
}

// Byte lengths, not character counts.
fn used_excluding(conn: &Connection, key: Option<&str>) -> Result<u64> {
    let used: i64 = conn.query_row(
        "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
         FROM kv_entries WHERE ?1 IS NULL OR key != ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(used.max(0) as u64)
}

#[async_trait]
impl StorageMedium for SqliteMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_sync(key)
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_sync(key, value)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv_entries")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
