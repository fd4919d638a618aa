//! Gemini generateContent driver.
//!
//! - Request: `contents[0].parts`, text first, then inline media.
//! - Audio parts use snake_case `inline_data { mime_type, data }`; image parts
//!   use camelCase `inlineData { mimeType, data }`. Both are accepted by the API.
//! - Response: `candidates[0].content.parts[0].text`.
//! - API key is passed as `?key=` query parameter, not in headers.

use serde_json::Value;

use crate::config::{BackendKind, RemoteModelConfig};
use crate::error::{Capability, Error, ErrorContext};
use crate::types::{MediaKind, PromptRequest};
use crate::Result;

use super::{DriverRequest, HttpMethod, ProviderDriver};

#[derive(Debug, Default)]
pub struct GeminiDriver;

impl GeminiDriver {
    pub fn new() -> Self {
        Self
    }

    /// Model ids may be given as `models/gemini-pro` or `gemini-pro`.
    fn model_path(model_id: &str) -> &str {
        model_id.strip_prefix("models/").unwrap_or(model_id)
    }

    fn key_query(config: &RemoteModelConfig) -> Vec<(String, String)> {
        if config.credential().is_empty() {
            Vec::new()
        } else {
            vec![("key".to_string(), config.credential().to_string())]
        }
    }

    fn parts(prompt: &PromptRequest) -> Value {
        let mut parts = vec![serde_json::json!({ "text": prompt.instructions })];
        if let Some(media) = &prompt.media {
            parts.push(match media.kind {
                MediaKind::Audio => serde_json::json!({
                    "inline_data": { "mime_type": media.mime_type, "data": media.base64() }
                }),
                MediaKind::Image => serde_json::json!({
                    "inlineData": { "mimeType": media.mime_type, "data": media.base64() }
                }),
            });
        }
        Value::Array(parts)
    }
}

impl ProviderDriver for GeminiDriver {
    fn backend(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::AudioInput | Capability::ImageInput)
    }

    fn build_request(
        &self,
        config: &RemoteModelConfig,
        prompt: &PromptRequest,
    ) -> Result<DriverRequest> {
        let body = serde_json::json!({
            "contents": [{ "parts": Self::parts(prompt) }],
        });

        Ok(DriverRequest {
            method: HttpMethod::Post,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint(),
                Self::model_path(config.model_id())
            ),
            query: Self::key_query(config),
            headers: Vec::new(),
            body: Some(body),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        if let Some(text) = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
        {
            return Ok(text.to_string());
        }

        let mut context = ErrorContext::new()
            .with_field_path("candidates[0].content.parts[0].text")
            .with_source("gemini_driver");
        if let Some(reason) = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            context = context.with_details(format!("prompt blocked: {}", reason));
        } else if let Some(reason) = body
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
        {
            context = context.with_details(format!("finish reason: {}", reason));
        }
        Err(Error::invalid_shape_with_context(
            "response has no completion text",
            context,
        ))
    }

    fn probe_request(&self, config: &RemoteModelConfig) -> DriverRequest {
        DriverRequest {
            method: HttpMethod::Get,
            url: format!("{}/models", config.endpoint()),
            query: Self::key_query(config),
            headers: Vec::new(),
            body: None,
        }
    }
}
