//! Cache-backed translation service.
//!
//! Composes an [`InferenceClient`] with one or two [`CacheStore`]s: the text
//! store holds translation records, the optional media store holds text
//! derived from audio and images.

use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{content_digest, CacheKey, CacheStore, Namespace};
use crate::client::InferenceClient;
use crate::config::{DEFAULT_MEDIA_TTL_SECS, DEFAULT_TRANSLATION_TTL_SECS};
use crate::error::Error;
use crate::prompts;
use crate::structured::TranslationRecord;
use crate::types::PromptRequest;
use crate::Result;

/// Outcome of [`TranslationService::translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub record: TranslationRecord,
    /// Served from the cache without a network call.
    pub cached: bool,
}

pub struct TranslationService {
    client: Arc<InferenceClient>,
    text_cache: Arc<CacheStore>,
    media_cache: Option<Arc<CacheStore>>,
    translation_ttl: Duration,
    media_ttl: Duration,
}

impl TranslationService {
    pub fn new(client: Arc<InferenceClient>, text_cache: Arc<CacheStore>) -> Self {
        Self {
            client,
            text_cache,
            media_cache: None,
            translation_ttl: Duration::from_secs(DEFAULT_TRANSLATION_TTL_SECS),
            media_ttl: Duration::from_secs(DEFAULT_MEDIA_TTL_SECS),
        }
    }

    pub fn with_media_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.media_cache = Some(cache);
        self
    }

    pub fn with_ttls(mut self, translation_ttl: Duration, media_ttl: Duration) -> Self {
        self.translation_ttl = translation_ttl;
        self.media_ttl = media_ttl;
        self
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub async fn translate(&self, text: &str, target_lang: &str) -> Result<Translation> {
        self.translate_with_cancel(text, target_lang, None).await
    }

    /// Translate with the JSON contract, consulting the text cache first.
    /// Cache write faults are logged and do not fail the call; a cancelled
    /// call never writes the cache.
    pub async fn translate_with_cancel(
        &self,
        text: &str,
        target_lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Translation> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Err(Error::InvalidInput("text to translate is empty".into()));
        }
        let target = target_lang.trim();
        if target.is_empty() {
            return Err(Error::InvalidInput("target language is empty".into()));
        }
        let parts = [normalized.as_str(), target];

        if let Some(record) = self
            .text_cache
            .get_json::<_, TranslationRecord>(Namespace::Translation, &parts)
            .await
        {
            debug!(target_lang = target, "translation served from cache");
            return Ok(Translation {
                record,
                cached: true,
            });
        }

        let request = PromptRequest::text(prompts::translation(&normalized, target)).expect_json();
        let record = self
            .client
            .send(&request, cancel)
            .await?
            .into_structured()
            .ok_or_else(|| Error::InvalidResponseShape {
                message: "expected a structured translation".into(),
                context: Default::default(),
            })?;

        if let Err(e) = self
            .text_cache
            .put_json(Namespace::Translation, &parts, &record, self.translation_ttl)
            .await
        {
            warn!(error = %e, "failed to cache translation");
        }

        Ok(Translation {
            record,
            cached: false,
        })
    }

    /// Translate several texts concurrently. Results keep input order.
    pub async fn translate_many<S: AsRef<str>>(
        &self,
        texts: &[S],
        target_lang: &str,
    ) -> Vec<Result<Translation>> {
        join_all(texts.iter().map(|t| self.translate(t.as_ref(), target_lang))).await
    }

    /// Transcribe and translate a recording, caching by content digest.
    pub async fn transcribe_cached(
        &self,
        audio: impl Into<Bytes>,
        mime_type: &str,
        target_lang: &str,
    ) -> Result<String> {
        self.transcribe_cached_with_cancel(audio, mime_type, target_lang, None)
            .await
    }

    pub async fn transcribe_cached_with_cancel(
        &self,
        audio: impl Into<Bytes>,
        mime_type: &str,
        target_lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let audio = audio.into();
        let request =
            PromptRequest::audio(prompts::transcription(target_lang), audio.clone(), mime_type);
        self.media_text(Namespace::Voice, &audio, target_lang, request, cancel)
            .await
    }

    /// Extract and translate text from an image, caching by content digest.
    pub async fn describe_image_cached(
        &self,
        image: impl Into<Bytes>,
        mime_type: &str,
        target_lang: &str,
    ) -> Result<String> {
        self.describe_image_cached_with_cancel(image, mime_type, target_lang, None)
            .await
    }

    pub async fn describe_image_cached_with_cancel(
        &self,
        image: impl Into<Bytes>,
        mime_type: &str,
        target_lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let image = image.into();
        let request =
            PromptRequest::image(prompts::image_text(target_lang), image.clone(), mime_type);
        self.media_text(Namespace::Image, &image, target_lang, request, cancel)
            .await
    }

    async fn media_text(
        &self,
        namespace: Namespace,
        bytes: &[u8],
        target_lang: &str,
        request: PromptRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let digest = content_digest(bytes);
        let parts = [digest.as_str(), target_lang];

        if let Some(cache) = &self.media_cache {
            if let Some(hit) = cache.get(namespace, &parts).await {
                match String::from_utf8(hit) {
                    Ok(text) => {
                        debug!(namespace = namespace.prefix(), "media text served from cache");
                        return Ok(text);
                    }
                    Err(_) => {
                        warn!(namespace = namespace.prefix(), "cached media text is not utf-8");
                        if let Err(e) = cache.delete(&CacheKey::derive(namespace, &parts)).await {
                            warn!(
                                namespace = namespace.prefix(),
                                error = %e,
                                "failed to drop unreadable media text"
                            );
                        }
                    }
                }
            }
        }

        let text = self.client.send(&request, cancel).await?.into_text();

        if let Some(cache) = &self.media_cache {
            if let Err(e) = cache
                .put(namespace, &parts, text.as_bytes(), self.media_ttl)
                .await
            {
                warn!(namespace = namespace.prefix(), error = %e, "failed to cache media text");
            }
        }
        Ok(text)
    }
}

/// Trim and collapse internal whitespace runs to one space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  hello   \n world\t"), "hello world");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_normalized_inputs_share_a_key() {
        let a = CacheKey::derive(Namespace::Translation, &[normalize_text(" hello "), "zh".into()]);
        let b = CacheKey::derive(Namespace::Translation, &[normalize_text("hello"), "zh".into()]);
        assert_eq!(a, b);
    }
}
