//! # Artifact Cache
//!
//! Expiring, size-bounded key/value storage for derived artifacts:
//! translation results, extracted image text and voice audio.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStore`] | TTL + budget-enforcing store over one medium |
//! | [`StorageMedium`] | Trait for physical media |
//! | [`MemoryMedium`] | Synchronous string-valued store with an optional quota |
//! | [`SqliteMedium`] | The same string-valued store, persisted in SQLite |
//! | [`DirectoryMedium`] | Asynchronous blob store on disk |
//! | [`CacheKey`] | Namespaced key derived from semantic inputs |
//! | [`Clock`] | Timestamp source; [`ManualClock`] for tests |
//!
//! ## Example
//!
//! ```rust,no_run
//! use lingo_core::cache::{CacheStore, MemoryMedium, Namespace, StoreBudget};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> lingo_core::Result<()> {
//! let store = CacheStore::open(Arc::new(MemoryMedium::new()), StoreBudget::bytes(4 << 20)).await?;
//! store
//!     .put(Namespace::Translation, &["hello", "zh"], "你好".as_bytes(), Duration::from_secs(3600))
//!     .await?;
//! assert!(store.get(Namespace::Translation, &["hello", "zh"]).await.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! Entries are never mutated in place: a second write to the same key
//! replaces the payload and resets its timestamp and write position.

mod backend;
mod clock;
mod index;
mod key;
mod manager;
mod sqlite;

pub use backend::{DirectoryMedium, MemoryMedium, StorageMedium};
pub use clock::{Clock, ManualClock, SystemClock};
pub use index::{EntryMeta, INDEX_KEY};
pub use key::{content_digest, rolling_hash, CacheKey, Namespace};
pub use manager::{CacheStats, CacheStore, StoreBudget};
pub use sqlite::SqliteMedium;
