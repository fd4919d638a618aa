//! Shared fixtures for integration tests.

#![allow(dead_code)]

use lingo_core::config::BackendKind;
use lingo_core::{InferenceClient, RemoteModelConfig};
use mockito::{Matcher, Mock, ServerGuard};
use std::time::Duration;
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";

/// Mock inference endpoint plus clients pointed at it.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = mockito::Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn openai_client(&self) -> InferenceClient {
        let config =
            RemoteModelConfig::new(format!("{}/v1", self.base_url), API_KEY, "gpt-4o-mini")
                .unwrap();
        InferenceClient::new(config).unwrap()
    }

    pub fn gemini_client(&self) -> InferenceClient {
        let config = RemoteModelConfig::with_backend(
            format!("{}/v1beta", self.base_url),
            API_KEY,
            "gemini-1.5-flash",
            BackendKind::Gemini,
        )
        .unwrap();
        InferenceClient::new(config).unwrap()
    }

    /// 200 OpenAI chat completion whose content is `content`.
    pub async fn mock_openai_completion(&mut self, content: &str) -> Mock {
        self.server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(openai_body(content))
            .create_async()
            .await
    }

    /// 200 Gemini generateContent reply whose first part is `text`.
    pub async fn mock_gemini_completion(&mut self, text: &str) -> Mock {
        self.server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), API_KEY.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(gemini_body(text))
            .create_async()
            .await
    }

    pub async fn mock_error_response(&mut self, path: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}

pub fn openai_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

pub fn gemini_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

/// A TCP endpoint that accepts connections and never answers.
pub async fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}/v1", addr)
}

pub fn openai_client_at(endpoint: &str, timeout: Duration) -> InferenceClient {
    let config = RemoteModelConfig::new(endpoint, API_KEY, "gpt-4o-mini")
        .unwrap()
        .with_timeout(timeout);
    InferenceClient::new(config).unwrap()
}

pub fn gemini_client_at(endpoint: &str, timeout: Duration) -> InferenceClient {
    let config =
        RemoteModelConfig::with_backend(endpoint, API_KEY, "gemini-1.5-flash", BackendKind::Gemini)
            .unwrap()
            .with_timeout(timeout);
    InferenceClient::new(config).unwrap()
}
