//! # Types Module
//!
//! Request and result types shared by the drivers and the inference client.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PromptRequest`] | Instructions plus optional inline media |
//! | [`InlineMedia`] | Audio or image bytes with their MIME type |
//! | [`PromptResult`] | Raw text or a validated [`TranslationRecord`](crate::structured::TranslationRecord) |
//!
//! ## Example
//!
//! ```rust
//! use lingo_core::types::{MediaKind, PromptRequest};
//!
//! let req = PromptRequest::text("Translate 'hello' to French").expect_json();
//! assert!(req.expect_json);
//!
//! let img = PromptRequest::image("Extract the text", vec![0x89u8, 0x50], "image/png");
//! assert_eq!(img.media.as_ref().map(|m| m.kind), Some(MediaKind::Image));
//! ```

pub mod prompt;

pub use prompt::{InlineMedia, MediaKind, PromptRequest, PromptResult};
