use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::drivers::{DriverRequest, HttpMethod};
use crate::error::{Error, ErrorContext};
use crate::Result;

/// Failures below the response-parsing layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-2xx response; `message` is the provider's own error text when the
    /// body carried one.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Other(String),
}

/// Thin reqwest wrapper: bounded timeout, cancellation, and one normalized
/// error for every way a call can fail before a body is parsed.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `request` and return the parsed JSON body of a 2xx response.
    ///
    /// No retries. If `cancel` fires first the call resolves to
    /// [`Error::Cancelled`].
    pub async fn send_json(
        &self,
        request: &DriverRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        match cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(path = %redacted_path(&request.url), "request cancelled");
                        Err(Error::Cancelled)
                    }
                    result = self.execute(request) => result,
                }
            }
            None => self.execute(request).await,
        }
    }

    async fn execute(&self, request: &DriverRequest) -> Result<Value> {
        let start = Instant::now();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.map_reqwest(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_reqwest(e))?;

        info!(
            http_status = status.as_u16(),
            path = %redacted_path(&request.url),
            duration_ms = start.elapsed().as_millis() as u64,
            "inference request finished"
        );

        if !status.is_success() {
            return Err(Error::Transport(TransportError::Status {
                status: status.as_u16(),
                message: provider_error_message(&text)
                    .unwrap_or_else(|| default_status_message(status)),
            }));
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::invalid_shape_with_context(
                "response body is not JSON",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("http_transport"),
            )
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Transport(TransportError::Timeout(self.timeout))
        } else {
            Error::Transport(TransportError::Http(e))
        }
    }
}

/// `{"error": {"message": ...}}` (OpenAI and Gemini), `{"error": "..."}` or
/// `{"message": ...}`.
fn provider_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| v.get("error").and_then(Value::as_str))
        .or_else(|| v.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn default_status_message(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("request failed: {}", reason),
        None => "request failed".to_string(),
    }
}

// Path only: Gemini carries the credential in the query string.
fn redacted_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message_shapes() {
        assert_eq!(
            provider_error_message(r#"{"error":{"message":"Incorrect API key provided"}}"#),
            Some("Incorrect API key provided".into())
        );
        assert_eq!(
            provider_error_message(r#"{"error":"model not found"}"#),
            Some("model not found".into())
        );
        assert_eq!(
            provider_error_message(r#"{"message":"quota"}"#),
            Some("quota".into())
        );
        assert_eq!(provider_error_message("<html>502</html>"), None);
        assert_eq!(provider_error_message(r#"{"error":{"message":"  "}}"#), None);
    }

    #[test]
    fn test_redacted_path_drops_query() {
        assert_eq!(
            redacted_path("https://generativelanguage.googleapis.com/v1beta/models/m:generateContent?key=secret"),
            "/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn test_status_error_display_prefers_provider_message() {
        let err = Error::Transport(TransportError::Status {
            status: 401,
            message: "Incorrect API key provided".into(),
        });
        assert_eq!(err.to_string(), "Incorrect API key provided (HTTP 401)");
    }
}
