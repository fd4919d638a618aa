use thiserror::Error;

use crate::config::BackendKind;
use crate::transport::TransportError;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or key that caused the error (e.g., "choices[0].message.content", "translation")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "cache_store", "openai_driver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A capability that only some backends implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    AudioInput,
    ImageInput,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::AudioInput => f.write_str("audio input"),
            Capability::ImageInput => f.write_str("image input"),
        }
    }
}

/// Unified error type for the cache and the inference adapter.
///
/// Every failure that crosses a component boundary is one of these variants
/// and carries a human-readable message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Capability not supported: {capability} is not available on the {backend} backend")]
    CapabilityNotSupported {
        capability: Capability,
        backend: BackendKind,
    },

    #[error("Invalid response shape: {message}{}", format_context(.context))]
    InvalidResponseShape {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage quota exceeded: {message}")]
    StorageQuotaExceeded { message: String },

    #[error("Storage error: {message}{}", format_context(.context))]
    Storage {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_shape_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidResponseShape {
            message: msg.into(),
            context,
        }
    }

    pub fn storage_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Storage {
            message: msg.into(),
            context,
        }
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Error::StorageQuotaExceeded {
            message: msg.into(),
        }
    }

    /// Stable snake_case class name, suitable for logs and metrics labels.
    pub fn class(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "configuration",
            Error::Transport(TransportError::Timeout(_)) => "timeout",
            Error::Transport(_) => "transport",
            Error::CapabilityNotSupported { .. } => "capability_not_supported",
            Error::InvalidResponseShape { .. } => "invalid_response_shape",
            Error::StorageQuotaExceeded { .. } => "storage_quota_exceeded",
            Error::Storage { .. } => "storage",
            Error::InvalidInput(_) => "invalid_input",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Cancellation is an outcome, not a failure; callers branch on this.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::StorageQuotaExceeded { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::InvalidResponseShape { context, .. }
            | Error::Storage { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::DiskFull =>
            {
                Error::quota_exceeded(format!("sqlite database is full: {}", e))
            }
            _ => Error::storage_with_context(e.to_string(), ErrorContext::new().with_source("sqlite")),
        }
    }
}
