//! Provider drivers: one per backend family.
//!
//! A driver turns a [`PromptRequest`] into a concrete HTTP request for its
//! backend and extracts the single text completion from the backend's
//! response envelope. Drivers do no I/O; the
//! [`HttpTransport`](crate::transport::HttpTransport) executes what they build.

pub mod gemini;

use serde_json::Value;

use crate::config::{BackendKind, RemoteModelConfig};
use crate::error::{Capability, Error, ErrorContext};
use crate::types::{MediaKind, PromptRequest};
use crate::Result;

pub use gemini::GeminiDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Fully resolved HTTP request for one backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl DriverRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Backend-specific request shaping and response parsing.
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    fn backend(&self) -> BackendKind;

    /// Whether inline media of this kind can be sent.
    fn supports(&self, capability: Capability) -> bool;

    fn build_request(
        &self,
        config: &RemoteModelConfig,
        prompt: &PromptRequest,
    ) -> Result<DriverRequest>;

    /// Extract the top-level text completion.
    fn parse_response(&self, body: &Value) -> Result<String>;

    /// Cheap request used to validate credentials and endpoint.
    fn probe_request(&self, config: &RemoteModelConfig) -> DriverRequest;
}

/// Driver for OpenAI-compatible chat completions.
#[derive(Debug, Default)]
pub struct OpenAiDriver;

impl OpenAiDriver {
    pub fn new() -> Self {
        Self
    }

    fn auth_headers(config: &RemoteModelConfig) -> Vec<(String, String)> {
        if config.credential().is_empty() {
            Vec::new()
        } else {
            vec![(
                "Authorization".to_string(),
                format!("Bearer {}", config.credential()),
            )]
        }
    }
}

impl ProviderDriver for OpenAiDriver {
    fn backend(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::ImageInput)
    }

    fn build_request(
        &self,
        config: &RemoteModelConfig,
        prompt: &PromptRequest,
    ) -> Result<DriverRequest> {
        let content = match &prompt.media {
            None => Value::String(prompt.instructions.clone()),
            Some(media) if media.kind == MediaKind::Image => serde_json::json!([
                { "type": "text", "text": prompt.instructions },
                { "type": "image_url", "image_url": { "url": media.data_url() } },
            ]),
            Some(media) => {
                return Err(Error::CapabilityNotSupported {
                    capability: media.kind.capability(),
                    backend: self.backend(),
                })
            }
        };

        let body = serde_json::json!({
            "model": config.model_id(),
            "messages": [{ "role": "user", "content": content }],
        });

        Ok(DriverRequest {
            method: HttpMethod::Post,
            url: format!("{}/chat/completions", config.endpoint()),
            query: Vec::new(),
            headers: Self::auth_headers(config),
            body: Some(body),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                Error::invalid_shape_with_context(
                    "response has no completion text",
                    ErrorContext::new()
                        .with_field_path("choices[0].message.content")
                        .with_source("openai_driver"),
                )
            })
    }

    fn probe_request(&self, config: &RemoteModelConfig) -> DriverRequest {
        DriverRequest {
            method: HttpMethod::Get,
            url: format!("{}/models", config.endpoint()),
            query: Vec::new(),
            headers: Self::auth_headers(config),
            body: None,
        }
    }
}

/// Driver for a backend kind, chosen once per client.
pub fn create_driver(kind: BackendKind) -> Box<dyn ProviderDriver> {
    match kind {
        BackendKind::OpenAi => Box::new(OpenAiDriver::new()),
        BackendKind::Gemini => Box::new(GeminiDriver::new()),
    }
}
