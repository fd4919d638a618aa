use bytes::Bytes;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{BackendKind, RemoteModelConfig};
use crate::drivers::{create_driver, ProviderDriver};
use crate::error::Error;
use crate::structured::parse_translation_record;
use crate::transport::HttpTransport;
use crate::types::{PromptRequest, PromptResult};
use crate::Result;

/// The adapter: shapes prompts for the configured backend, sends them, and
/// normalizes the reply.
///
/// Calls are independent; nothing is queued or rate limited here, and a
/// timed-out call is not retried.
pub struct InferenceClient {
    config: RemoteModelConfig,
    driver: Box<dyn ProviderDriver>,
    transport: HttpTransport,
}

impl InferenceClient {
    pub fn new(config: RemoteModelConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        let driver = create_driver(config.backend_kind());
        debug!(
            backend = %config.backend_kind(),
            model = config.model_id(),
            timeout_secs = config.timeout().as_secs(),
            "inference client created"
        );
        Ok(Self {
            config,
            driver,
            transport,
        })
    }

    pub fn config(&self) -> &RemoteModelConfig {
        &self.config
    }

    pub fn backend(&self) -> BackendKind {
        self.config.backend_kind()
    }

    /// Send one prompt. Requests needing a capability the backend lacks fail
    /// before anything goes on the wire.
    pub async fn send(
        &self,
        prompt: &PromptRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<PromptResult> {
        if let Some(capability) = prompt.required_capability() {
            if !self.driver.supports(capability) {
                return Err(Error::CapabilityNotSupported {
                    capability,
                    backend: self.backend(),
                });
            }
        }

        let start = Instant::now();
        let request = self.driver.build_request(&self.config, prompt)?;
        let body = self.transport.send_json(&request, cancel).await?;
        let text = self.driver.parse_response(&body)?;

        debug!(
            backend = %self.backend(),
            expect_json = prompt.expect_json,
            media = prompt.media.is_some(),
            chars = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        if prompt.expect_json {
            Ok(PromptResult::Structured(parse_translation_record(&text)?))
        } else {
            Ok(PromptResult::Text(text))
        }
    }

    /// Text prompt. With `expect_json` the reply must satisfy the translation
    /// JSON contract.
    pub async fn generate_text(&self, prompt: &str, expect_json: bool) -> Result<PromptResult> {
        self.generate_text_with_cancel(prompt, expect_json, None).await
    }

    pub async fn generate_text_with_cancel(
        &self,
        prompt: &str,
        expect_json: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<PromptResult> {
        let mut request = PromptRequest::text(prompt);
        request.expect_json = expect_json;
        self.send(&request, cancel).await
    }

    /// Audio prompt; Gemini only.
    pub async fn process_audio(
        &self,
        audio: impl Into<Bytes>,
        mime_type: &str,
        prompt: &str,
    ) -> Result<String> {
        self.process_audio_with_cancel(audio, mime_type, prompt, None).await
    }

    pub async fn process_audio_with_cancel(
        &self,
        audio: impl Into<Bytes>,
        mime_type: &str,
        prompt: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let request = PromptRequest::audio(prompt, audio, mime_type);
        Ok(self.send(&request, cancel).await?.into_text())
    }

    pub async fn generate_image_content(
        &self,
        prompt: &str,
        image: impl Into<Bytes>,
        mime_type: &str,
    ) -> Result<String> {
        self.generate_image_content_with_cancel(prompt, image, mime_type, None)
            .await
    }

    pub async fn generate_image_content_with_cancel(
        &self,
        prompt: &str,
        image: impl Into<Bytes>,
        mime_type: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let request = PromptRequest::image(prompt, image, mime_type);
        Ok(self.send(&request, cancel).await?.into_text())
    }

    /// Probe the endpoint with a model-list call. Never fails; any error
    /// means `false`.
    pub async fn test_connection(&self) -> bool {
        let probe = self.driver.probe_request(&self.config);
        match self.transport.send_json(&probe, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(backend = %self.backend(), error = %e, "connection test failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("backend", &self.backend())
            .field("endpoint", &self.config.endpoint())
            .field("model", &self.config.model_id())
            .finish()
    }
}
