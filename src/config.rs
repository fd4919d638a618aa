//! Runtime configuration.
//!
//! [`Settings`] is read from an optional YAML file and then overridden by
//! `LINGO_*` environment variables. [`RemoteModelConfig`] is the immutable,
//! validated view of the remote model settings that an
//! [`InferenceClient`](crate::client::InferenceClient) is built from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, ErrorContext};
use crate::Result;

/// Host that identifies the Gemini generateContent API.
pub const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEXT_BUDGET_BYTES: u64 = 4 * 1024 * 1024;
pub const DEFAULT_BLOB_BUDGET_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_TRANSLATION_TTL_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_MEDIA_TTL_SECS: u64 = 30 * 24 * 3600;

/// Request/response shape of the remote inference API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `POST {endpoint}/chat/completions` with bearer auth.
    OpenAi,
    /// `POST {endpoint}/models/{model}:generateContent?key=...`.
    Gemini,
}

impl BackendKind {
    /// Gemini when the endpoint URL mentions the Gemini host anywhere
    /// (case-insensitive), OpenAI otherwise. Only used when no explicit kind
    /// is configured.
    pub fn infer_from_endpoint(endpoint: &url::Url) -> Self {
        if endpoint.as_str().to_ascii_lowercase().contains(GEMINI_HOST) {
            BackendKind::Gemini
        } else {
            BackendKind::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-chat" | "openai_chat" => Ok(BackendKind::OpenAi),
            "gemini" | "gemini-generate" | "gemini_generate" => Ok(BackendKind::Gemini),
            other => Err(Error::configuration_with_context(
                format!("unknown backend kind '{}'", other),
                ErrorContext::new()
                    .with_field_path("remote.backend")
                    .with_details("expected 'openai' or 'gemini'"),
            )),
        }
    }
}

/// Immutable remote model settings owned by one adapter instance.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteModelConfig {
    endpoint: String,
    credential: String,
    model_id: String,
    backend_kind: BackendKind,
    timeout: Duration,
}

impl RemoteModelConfig {
    /// Build a config, inferring the backend kind from the endpoint URL.
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self> {
        Self::build(endpoint.into(), credential.into(), model_id.into(), None)
    }

    /// Build a config with an explicit backend kind.
    pub fn with_backend(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model_id: impl Into<String>,
        backend_kind: BackendKind,
    ) -> Result<Self> {
        Self::build(
            endpoint.into(),
            credential.into(),
            model_id.into(),
            Some(backend_kind),
        )
    }

    fn build(
        endpoint: String,
        credential: String,
        model_id: String,
        backend_kind: Option<BackendKind>,
    ) -> Result<Self> {
        let parsed = url::Url::parse(endpoint.trim()).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint URL: {}", e),
                ErrorContext::new()
                    .with_field_path("remote.api_url")
                    .with_details(endpoint.clone()),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "endpoint must use http or https",
                ErrorContext::new().with_field_path("remote.api_url"),
            ));
        }
        let model_id = model_id.trim().to_string();
        if model_id.is_empty() {
            return Err(Error::configuration_with_context(
                "model id must not be empty",
                ErrorContext::new().with_field_path("remote.model"),
            ));
        }

        let backend_kind =
            backend_kind.unwrap_or_else(|| BackendKind::infer_from_endpoint(&parsed));

        Ok(Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            credential: credential.trim().to_string(),
            model_id,
            backend_kind,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Returns a copy with a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for RemoteModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteModelConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("backend_kind", &self.backend_kind)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `remote:` section of the settings file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub backend: Option<BackendKind>,
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("backend", &self.backend)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `cache:` section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub text_budget_bytes: u64,
    pub blob_budget_bytes: u64,
    pub translation_ttl_secs: u64,
    pub media_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            text_budget_bytes: DEFAULT_TEXT_BUDGET_BYTES,
            blob_budget_bytes: DEFAULT_BLOB_BUDGET_BYTES,
            translation_ttl_secs: DEFAULT_TRANSLATION_TTL_SECS,
            media_ttl_secs: DEFAULT_MEDIA_TTL_SECS,
        }
    }
}

impl CacheSettings {
    pub fn translation_ttl(&self) -> Duration {
        Duration::from_secs(self.translation_ttl_secs)
    }

    pub fn media_ttl(&self) -> Duration {
        Duration::from_secs(self.media_ttl_secs)
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub cache: CacheSettings,
    pub data_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from an optional YAML file, then apply `LINGO_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_yaml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to parse settings: {}", e),
                ErrorContext::new().with_source("settings_yaml"),
            )
        })
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LINGO_API_URL") {
            self.remote.api_url = Some(v);
        }
        if let Some(v) = lookup("LINGO_API_KEY") {
            self.remote.api_key = Some(v);
        }
        if let Some(v) = lookup("LINGO_MODEL") {
            self.remote.model = Some(v);
        }
        if let Some(v) = lookup("LINGO_BACKEND") {
            self.remote.backend = Some(v.parse()?);
        }
        if let Some(v) = lookup("LINGO_HTTP_TIMEOUT_SECS") {
            self.remote.timeout_secs = Some(parse_u64("LINGO_HTTP_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("LINGO_TEXT_CACHE_BUDGET_BYTES") {
            self.cache.text_budget_bytes = parse_u64("LINGO_TEXT_CACHE_BUDGET_BYTES", &v)?;
        }
        if let Some(v) = lookup("LINGO_BLOB_CACHE_BUDGET_BYTES") {
            self.cache.blob_budget_bytes = parse_u64("LINGO_BLOB_CACHE_BUDGET_BYTES", &v)?;
        }
        if let Some(v) = lookup("LINGO_TRANSLATION_TTL_SECS") {
            self.cache.translation_ttl_secs = parse_u64("LINGO_TRANSLATION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("LINGO_MEDIA_TTL_SECS") {
            self.cache.media_ttl_secs = parse_u64("LINGO_MEDIA_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("LINGO_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Validated remote model config.
    pub fn remote_config(&self) -> Result<RemoteModelConfig> {
        let api_url = self.remote.api_url.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "api url is not configured",
                ErrorContext::new()
                    .with_field_path("remote.api_url")
                    .with_details("set LINGO_API_URL or remote.api_url"),
            )
        })?;
        let model = self.remote.model.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "model is not configured",
                ErrorContext::new()
                    .with_field_path("remote.model")
                    .with_details("set LINGO_MODEL or remote.model"),
            )
        })?;
        let key = self.remote.api_key.clone().unwrap_or_default();

        let config = match self.remote.backend {
            Some(kind) => RemoteModelConfig::with_backend(api_url, key, model, kind)?,
            None => RemoteModelConfig::new(api_url, key, model)?,
        };
        Ok(config.with_timeout(Duration::from_secs(
            self.remote.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )))
    }

    /// Directory for durable cache and record data.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lingo"))
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be a non-negative integer", name),
            ErrorContext::new().with_field_path(name).with_details(value),
        )
    })
}
