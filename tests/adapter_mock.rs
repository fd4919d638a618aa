//! Inference adapter against a mock HTTP server.

mod common;

use common::{openai_client_at, silent_endpoint, MockServerFixture, API_KEY};
use lingo_core::{BackendKind, Error, PromptResult, RemoteModelConfig};
use mockito::Matcher;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_openai_generate_text_posts_chat_completion() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", format!("Bearer {}", API_KEY).as_str())
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "hi" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(common::openai_body("hello there"))
        .expect(1)
        .create_async()
        .await;

    let client = fixture.openai_client();
    assert_eq!(client.backend(), BackendKind::OpenAi);
    let result = client.generate_text("hi", false).await.unwrap();
    assert_eq!(result, PromptResult::Text("hello there".into()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_generate_text_uses_key_query() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture.mock_gemini_completion("bonjour").await;

    let client = fixture.gemini_client();
    let result = client.generate_text("hello", false).await.unwrap();
    assert_eq!(result.as_text(), Some("bonjour"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_backend_follows_host() {
    let gemini = RemoteModelConfig::new(
        "https://generativelanguage.googleapis.com/v1beta",
        "k",
        "gemini-1.5-flash",
    )
    .unwrap();
    assert_eq!(gemini.backend_kind(), BackendKind::Gemini);

    let openai = RemoteModelConfig::new("https://api.openai.com/v1", "k", "gpt-4o").unwrap();
    assert_eq!(openai.backend_kind(), BackendKind::OpenAi);
}

#[tokio::test]
async fn test_json_contract_parses_fenced_reply() {
    let mut fixture = MockServerFixture::new().await;
    let reply = "```json\n{\"detectedLang\":\"en\",\"sourceLangName\":\"English\",\"translation\":\"你好\",\"confidence\":0.9}\n```";
    let _m = fixture.mock_openai_completion(reply).await;

    let record = fixture
        .openai_client()
        .generate_text("translate", true)
        .await
        .unwrap()
        .into_structured()
        .unwrap();
    assert_eq!(record.detected_language, "en");
    assert_eq!(record.source_language_name, "English");
    assert_eq!(record.translation, "你好");
}

#[tokio::test]
async fn test_json_contract_missing_field_is_invalid_shape() {
    let mut fixture = MockServerFixture::new().await;
    let _m = fixture.mock_openai_completion(r#"{"detectedLang":"en"}"#).await;

    let err = fixture
        .openai_client()
        .generate_text("translate", true)
        .await
        .unwrap_err();
    assert_eq!(err.class(), "invalid_response_shape");
    assert!(matches!(err, Error::InvalidResponseShape { .. }));
}

#[tokio::test]
async fn test_missing_envelope_field_is_invalid_shape() {
    let mut fixture = MockServerFixture::new().await;
    let _m = fixture
        .server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
        .create_async()
        .await;

    let err = fixture
        .gemini_client()
        .generate_text("hello", false)
        .await
        .unwrap_err();
    assert_eq!(err.class(), "invalid_response_shape");
    assert!(err.to_string().contains("SAFETY"));
}

#[tokio::test]
async fn test_provider_error_message_is_preferred() {
    let mut fixture = MockServerFixture::new().await;
    let _m = fixture
        .mock_error_response(
            "/v1/chat/completions",
            401,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        )
        .await;

    let err = fixture
        .openai_client()
        .generate_text("hi", false)
        .await
        .unwrap_err();
    assert_eq!(err.class(), "transport");
    assert_eq!(err.to_string(), "Incorrect API key provided (HTTP 401)");
}

#[tokio::test]
async fn test_non_json_error_body_falls_back_to_status() {
    let mut fixture = MockServerFixture::new().await;
    let _m = fixture
        .mock_error_response("/v1/chat/completions", 502, "<html>bad gateway</html>")
        .await;

    let err = fixture
        .openai_client()
        .generate_text("hi", false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "request failed: Bad Gateway (HTTP 502)");
}

#[tokio::test]
async fn test_audio_on_openai_makes_no_network_call() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = fixture
        .openai_client()
        .process_audio(vec![1u8, 2, 3], "audio/webm", "transcribe")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CapabilityNotSupported {
            backend: BackendKind::OpenAi,
            ..
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_audio_sends_inline_data() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), API_KEY.into()))
        .match_body(Matcher::PartialJson(serde_json::json!({
            "contents": [{ "parts": [
                { "text": "transcribe" },
                { "inline_data": { "mime_type": "audio/webm", "data": "AQID" } }
            ]}]
        })))
        .with_status(200)
        .with_body(common::gemini_body("hello world"))
        .create_async()
        .await;

    let text = fixture
        .gemini_client()
        .process_audio(vec![1u8, 2, 3], "audio/webm", "transcribe")
        .await
        .unwrap();
    assert_eq!(text, "hello world");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_image_uses_data_url() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex(
            r#""url":"data:image/png;base64,iVA=""#.to_string(),
        ))
        .with_status(200)
        .with_body(common::openai_body("STOP"))
        .create_async()
        .await;

    let text = fixture
        .openai_client()
        .generate_image_content("read the sign", vec![0x89u8, 0x50], "image/png")
        .await
        .unwrap();
    assert_eq!(text, "STOP");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_image_uses_camel_case_inline_data() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(serde_json::json!({
            "contents": [{ "parts": [
                { "text": "read" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "AQI=" } }
            ]}]
        })))
        .with_status(200)
        .with_body(common::gemini_body("menu"))
        .create_async()
        .await;

    let text = fixture
        .gemini_client()
        .generate_image_content("read", vec![1u8, 2], "image/jpeg")
        .await
        .unwrap();
    assert_eq!(text, "menu");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_timeout_is_reported_and_not_retried() {
    let endpoint = silent_endpoint().await;
    let client = openai_client_at(&endpoint, Duration::from_millis(200));

    let start = Instant::now();
    let err = client.generate_text("hi", false).await.unwrap_err();
    assert_eq!(err.class(), "timeout");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancellation_is_distinct_from_failure() {
    let endpoint = silent_endpoint().await;
    let client = openai_client_at(&endpoint, Duration::from_secs(30));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = client
        .generate_text_with_cancel("hi", false, Some(&token))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_test_connection() {
    let mut fixture = MockServerFixture::new().await;
    let _ok = fixture
        .server
        .mock("GET", "/v1/models")
        .match_header("authorization", format!("Bearer {}", API_KEY).as_str())
        .with_status(200)
        .with_body(r#"{"object":"list","data":[]}"#)
        .create_async()
        .await;
    assert!(fixture.openai_client().test_connection().await);

    let _denied = fixture
        .server
        .mock("GET", "/v1beta/models")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"message":"API key not valid"}}"#)
        .create_async()
        .await;
    assert!(!fixture.gemini_client().test_connection().await);
}

#[tokio::test]
async fn test_test_connection_unreachable_is_false() {
    let endpoint = silent_endpoint().await;
    let client = openai_client_at(&endpoint, Duration::from_millis(100));
    assert!(!client.test_connection().await);
}
