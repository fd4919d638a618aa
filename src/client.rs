//! Unified remote-inference client.
//!
//! One request/response contract over the OpenAI chat-completions and Gemini
//! generateContent APIs. The client is stateless between calls; its only
//! state is the immutable [`RemoteModelConfig`](crate::config::RemoteModelConfig)
//! it was built from.

pub mod core;

pub use core::InferenceClient;
