//! Local persistent record store on SQLite.
//!
//! Each partition is one table of `(id, body, updated_at)` rows, where `body`
//! is the record serialized as JSON. The schema version lives in
//! `PRAGMA user_version`. Opening a database written by an older version
//! creates the tables introduced since and leaves every existing table and
//! its rows untouched.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, ErrorContext};
use crate::Result;

pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Conversations,
    CurrentConversation,
    Vocabulary,
    Lyrics,
    Clipboard,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Conversations,
        Partition::CurrentConversation,
        Partition::Vocabulary,
        Partition::Lyrics,
        Partition::Clipboard,
    ];

    /// Partition name, also used as its table name.
    pub fn name(&self) -> &'static str {
        match self {
            Partition::Conversations => "conversations",
            Partition::CurrentConversation => "current_conversation",
            Partition::Vocabulary => "vocabulary",
            Partition::Lyrics => "lyrics",
            Partition::Clipboard => "clipboard",
        }
    }

    /// Schema version that first had this partition.
    pub fn introduced_in(&self) -> u32 {
        match self {
            Partition::Conversations | Partition::CurrentConversation | Partition::Vocabulary => 1,
            Partition::Lyrics => 2,
            Partition::Clipboard => 3,
        }
    }

    /// Partitions an upgrade from `version` has to create.
    pub fn added_since(version: u32) -> impl Iterator<Item = Partition> {
        Partition::ALL
            .into_iter()
            .filter(move |p| p.introduced_in() > version)
    }

    fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
            self.name()
        )
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Partition::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown partition: {}", s)))
    }
}

/// Opaque record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct RecordStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    version: u32,
}

impl RecordStore {
    /// Open or create the database at `path`, upgrading older schemas.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let previous: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if previous > SCHEMA_VERSION {
            return Err(Error::storage_with_context(
                format!(
                    "store schema version {} is newer than supported version {}",
                    previous, SCHEMA_VERSION
                ),
                ErrorContext::new().with_source(path.display().to_string()),
            ));
        }

        if previous < SCHEMA_VERSION {
            let created: Vec<&str> = Partition::added_since(previous).map(|p| p.name()).collect();
            let tx = conn.transaction()?;
            for partition in Partition::added_since(previous) {
                tx.execute_batch(&partition.create_sql())?;
            }
            tx.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
            tx.commit()?;
            info!(
                path = %path.display(),
                from = previous,
                to = SCHEMA_VERSION,
                created = ?created,
                "record store schema upgraded"
            );
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            version: SCHEMA_VERSION,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Insert or replace a record.
    pub fn put<T: Serialize>(&self, partition: Partition, id: &str, record: &T) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidInput("record id is empty".into()));
        }
        let body = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, body, updated_at) VALUES (?1, ?2, ?3)",
                partition.name()
            ),
            params![id, body, now_millis()],
        )?;
        debug!(partition = %partition, id, "record written");
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, partition: Partition, id: &str) -> Result<Option<T>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1", partition.name()),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(decode_body(partition, id, &body)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, partition: Partition, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", partition.name()),
            params![id],
        )?;
        Ok(removed > 0)
    }

    /// All records of a partition, ordered by id.
    pub fn list<T: DeserializeOwned>(&self, partition: Partition) -> Result<Vec<(String, T)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, body FROM {} ORDER BY id",
            partition.name()
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, body)| {
                let record = decode_body(partition, &id, &body)?;
                Ok((id, record))
            })
            .collect()
    }

    pub fn ids(&self, partition: Partition) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT id FROM {} ORDER BY id", partition.name()))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

fn decode_body<T: DeserializeOwned>(partition: Partition, id: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        Error::storage_with_context(
            format!("corrupt record body: {}", e),
            ErrorContext::new()
                .with_field_path(format!("{}.{}", partition, id))
                .with_source("record_store"),
        )
    })
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
