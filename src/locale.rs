//! Geolocation-based default language.
//!
//! Looks up the caller's country with a public geo-IP endpoint and maps it
//! to a language code through a static table.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, ErrorContext};
use crate::transport::TransportError;
use crate::Result;

pub const GEO_LOOKUP_URL: &str = "https://ipapi.co/json/";
pub const DEFAULT_LANGUAGE: &str = "en";

static COUNTRY_LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("US", "en"),
        ("GB", "en"),
        ("AU", "en"),
        ("CA", "en"),
        ("NZ", "en"),
        ("IE", "en"),
        ("CN", "zh"),
        ("TW", "zh"),
        ("HK", "zh"),
        ("SG", "zh"),
        ("JP", "ja"),
        ("KR", "ko"),
        ("FR", "fr"),
        ("BE", "fr"),
        ("DE", "de"),
        ("AT", "de"),
        ("CH", "de"),
        ("ES", "es"),
        ("MX", "es"),
        ("AR", "es"),
        ("CO", "es"),
        ("CL", "es"),
        ("PE", "es"),
        ("IT", "it"),
        ("PT", "pt"),
        ("BR", "pt"),
        ("RU", "ru"),
        ("UA", "uk"),
        ("PL", "pl"),
        ("NL", "nl"),
        ("SE", "sv"),
        ("NO", "no"),
        ("DK", "da"),
        ("FI", "fi"),
        ("TR", "tr"),
        ("GR", "el"),
        ("SA", "ar"),
        ("AE", "ar"),
        ("EG", "ar"),
        ("IL", "he"),
        ("IN", "hi"),
        ("TH", "th"),
        ("VN", "vi"),
        ("ID", "id"),
        ("MY", "ms"),
        ("PH", "tl"),
    ]
    .into_iter()
    .collect()
});

/// Language for an ISO 3166-1 alpha-2 country code, case-insensitive.
pub fn country_language(country_code: &str) -> Option<&'static str> {
    COUNTRY_LANGUAGES
        .get(country_code.trim().to_ascii_uppercase().as_str())
        .copied()
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocaleResolver {
    client: reqwest::Client,
    url: String,
}

impl LocaleResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self {
            client,
            url: GEO_LOOKUP_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Country code reported by the lookup service.
    pub async fn lookup_country(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: "geo lookup failed".to_string(),
            }
            .into());
        }
        let body: GeoResponse = response.json().await.map_err(TransportError::from)?;
        body.country_code
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                Error::invalid_shape_with_context(
                    "geo lookup response has no country code",
                    ErrorContext::new().with_field_path("country_code"),
                )
            })
    }

    /// Best-guess UI language. Any failure falls back to [`DEFAULT_LANGUAGE`].
    pub async fn detect_language(&self) -> String {
        match self.lookup_country().await {
            Ok(country) => {
                let lang = country_language(&country).unwrap_or(DEFAULT_LANGUAGE);
                debug!(country = %country, language = lang, "language detected");
                lang.to_string()
            }
            Err(e) => {
                warn!(error = %e, "language detection failed, using default");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_language() {
        assert_eq!(country_language("CN"), Some("zh"));
        assert_eq!(country_language("jp"), Some("ja"));
        assert_eq!(country_language(" br "), Some("pt"));
        assert_eq!(country_language("ZZ"), None);
    }

    #[tokio::test]
    async fn test_detect_language_from_lookup() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/json/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ip":"203.0.113.9","country_code":"FR"}"#)
            .create_async()
            .await;

        let resolver = LocaleResolver::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/json/", server.url()));
        assert_eq!(resolver.detect_language().await, "fr");
    }

    #[tokio::test]
    async fn test_detect_language_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/json/")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let resolver = LocaleResolver::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/json/", server.url()));
        assert!(resolver.lookup_country().await.is_err());
        assert_eq!(resolver.detect_language().await, DEFAULT_LANGUAGE);
    }

    #[tokio::test]
    async fn test_unknown_country_uses_default() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/json/")
            .with_status(200)
            .with_body(r#"{"country_code":"AQ"}"#)
            .create_async()
            .await;

        let resolver = LocaleResolver::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/json/", server.url()));
        assert_eq!(resolver.detect_language().await, "en");
    }
}
