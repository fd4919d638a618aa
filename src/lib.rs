//! # lingo-core
//!
//! Expiring artifact cache and unified remote-inference adapter for
//! AI-assisted translation and language learning.
//!
//! ## Overview
//!
//! Two components carry the weight:
//!
//! - **Expiring Cache Store**: namespace-partitioned key-value storage with
//!   TTL staleness and an aggregate size budget, over a string-keyed medium
//!   (translations) and a blob medium (voice and image artifacts).
//! - **Unified Remote-Inference Adapter**: one request/response contract over
//!   OpenAI-compatible chat completions and Gemini `generateContent`, with an
//!   optional JSON response contract for translations.
//!
//! Everything is constructed explicitly and passed where it is needed; there
//! is no process-global state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lingo_core::cache::{CacheStore, MemoryMedium, StoreBudget};
//! use lingo_core::translate::TranslationService;
//! use lingo_core::{InferenceClient, RemoteModelConfig};
//!
//! #[tokio::main]
//! async fn main() -> lingo_core::Result<()> {
//!     let config = RemoteModelConfig::new("https://api.openai.com/v1", "sk-...", "gpt-4o-mini")?;
//!     let client = Arc::new(InferenceClient::new(config)?);
//!
//!     let cache = CacheStore::open(Arc::new(MemoryMedium::new()), StoreBudget::bytes(4 << 20)).await?;
//!     let service = TranslationService::new(client, Arc::new(cache));
//!
//!     let result = service.translate("hello", "zh").await?;
//!     println!("{} ({})", result.record.translation, result.record.source_language_name);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Expiring, size-bounded cache over pluggable storage media |
//! | [`client`] | [`InferenceClient`], the unified adapter |
//! | [`config`] | Settings file, environment overrides, [`RemoteModelConfig`] |
//! | [`drivers`] | OpenAI and Gemini request/response shapes |
//! | [`transport`] | HTTP transport with timeout and cancellation |
//! | [`structured`] | JSON-contract parsing for translation replies |
//! | [`translate`] | Cache-backed translation service |
//! | [`prompts`] | Instruction templates |
//! | [`locale`] | Geolocation-based default language |
//! | [`records`] | Versioned local record store on SQLite |

pub mod cache;
pub mod client;
pub mod config;
pub mod drivers;
pub mod locale;
pub mod prompts;
pub mod records;
pub mod structured;
pub mod translate;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheKey, CacheStore, Namespace, StoreBudget};
pub use client::InferenceClient;
pub use config::{BackendKind, RemoteModelConfig, Settings};
pub use structured::TranslationRecord;
pub use translate::{Translation, TranslationService};
pub use types::{PromptRequest, PromptResult};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Capability, Error, ErrorContext};
