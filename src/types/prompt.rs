//! Prompt request/result model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::Capability;
use crate::structured::TranslationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    pub fn capability(&self) -> Capability {
        match self {
            MediaKind::Audio => Capability::AudioInput,
            MediaKind::Image => Capability::ImageInput,
        }
    }
}

/// Media sent inline with a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    pub kind: MediaKind,
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineMedia {
    pub fn new(kind: MediaKind, data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:{mime};base64,...` URL, as used by OpenAI image content parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// One independent request to the remote model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub instructions: String,
    pub media: Option<InlineMedia>,
    /// Parse the reply as a [`TranslationRecord`] instead of returning text.
    pub expect_json: bool,
}

impl PromptRequest {
    pub fn text(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            media: None,
            expect_json: false,
        }
    }

    pub fn audio(
        instructions: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            instructions: instructions.into(),
            media: Some(InlineMedia::new(MediaKind::Audio, data, mime_type)),
            expect_json: false,
        }
    }

    pub fn image(
        instructions: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            instructions: instructions.into(),
            media: Some(InlineMedia::new(MediaKind::Image, data, mime_type)),
            expect_json: false,
        }
    }

    pub fn expect_json(mut self) -> Self {
        self.expect_json = true;
        self
    }

    /// Capability the backend must have to serve this request.
    pub fn required_capability(&self) -> Option<Capability> {
        self.media.as_ref().map(|m| m.kind.capability())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
    Text(String),
    Structured(TranslationRecord),
}

impl PromptResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PromptResult::Text(s) => Some(s),
            PromptResult::Structured(_) => None,
        }
    }

    pub fn into_structured(self) -> Option<TranslationRecord> {
        match self {
            PromptResult::Structured(r) => Some(r),
            PromptResult::Text(_) => None,
        }
    }

    /// Best plain-text view: the translation for structured results.
    pub fn into_text(self) -> String {
        match self {
            PromptResult::Text(s) => s,
            PromptResult::Structured(r) => r.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let media = InlineMedia::new(MediaKind::Image, vec![1u8, 2, 3], "image/png");
        assert_eq!(media.base64(), "AQID");
        assert_eq!(media.data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_required_capability() {
        assert_eq!(PromptRequest::text("hi").required_capability(), None);
        assert_eq!(
            PromptRequest::audio("hi", vec![0u8], "audio/webm").required_capability(),
            Some(Capability::AudioInput)
        );
    }

    #[test]
    fn test_result_views() {
        let rec = TranslationRecord {
            detected_language: "en".into(),
            source_language_name: "English".into(),
            translation: "hola".into(),
        };
        let res = PromptResult::Structured(rec.clone());
        assert_eq!(res.as_text(), None);
        assert_eq!(res.clone().into_text(), "hola");
        assert_eq!(res.into_structured(), Some(rec));
    }
}
