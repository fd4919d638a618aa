//! JSON-contract mode for translation responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ValidationError;
use crate::error::{Error, ErrorContext};
use crate::Result;

/// Fields a translation response must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["detectedLang", "sourceLangName", "translation"];

/// Structured translation result returned in JSON-contract mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Language code the model detected for the input, e.g. `"en"`.
    #[serde(rename = "detectedLang")]
    pub detected_language: String,
    /// Display name of the source language, e.g. `"English"`.
    #[serde(rename = "sourceLangName")]
    pub source_language_name: String,
    pub translation: String,
}

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n?(.*?)\s*```$").ok());

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````).
/// Text without a fence is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// Field-level check of a parsed response against [`REQUIRED_FIELDS`].
pub fn validate_fields(value: &Value) -> Vec<ValidationError> {
    let Some(obj) = value.as_object() else {
        return vec![ValidationError::without_path("response is not a JSON object")
            .with_value(value.clone())];
    };
    REQUIRED_FIELDS
        .iter()
        .filter_map(|field| match obj.get(*field) {
            None | Some(Value::Null) => {
                Some(ValidationError::with_path("required field is missing", *field))
            }
            Some(Value::String(_)) => None,
            Some(other) => Some(
                ValidationError::with_path("expected a string", *field).with_value(other.clone()),
            ),
        })
        .collect()
}

/// Parse raw model output into a [`TranslationRecord`].
///
/// Fails with [`Error::InvalidResponseShape`] when the text is not JSON or
/// any required field is missing; partial records are never returned.
pub fn parse_translation_record(text: &str) -> Result<TranslationRecord> {
    let body = strip_code_fences(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::invalid_shape_with_context(
            "model output is not valid JSON",
            ErrorContext::new()
                .with_details(e.to_string())
                .with_source("translation_contract"),
        )
    })?;

    let errors = validate_fields(&value);
    if let Some(first) = errors.first() {
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut context = ErrorContext::new()
            .with_details(details)
            .with_source("translation_contract");
        if let Some(path) = &first.path {
            context = context.with_field_path(path.clone());
        }
        return Err(Error::invalid_shape_with_context(
            "malformed translation contract",
            context,
        ));
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_complete_record() {
        let rec = parse_translation_record(
            "```json\n{\"detectedLang\":\"en\",\"sourceLangName\":\"English\",\"translation\":\"你好\"}\n```",
        )
        .unwrap();
        assert_eq!(rec.detected_language, "en");
        assert_eq!(rec.source_language_name, "English");
        assert_eq!(rec.translation, "你好");
    }

    #[test]
    fn test_missing_translation_is_invalid_shape() {
        let err = parse_translation_record(r#"{"detectedLang":"en"}"#).unwrap_err();
        assert_eq!(err.class(), "invalid_response_shape");
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("sourceLangName"));
        assert!(ctx.details.as_deref().unwrap().contains("translation"));
    }

    #[test]
    fn test_wrong_type_and_non_object() {
        let err = parse_translation_record(
            r#"{"detectedLang":"en","sourceLangName":"English","translation":42}"#,
        )
        .unwrap_err();
        assert_eq!(err.class(), "invalid_response_shape");
        assert_eq!(validate_fields(&serde_json::json!([1, 2])).len(), 1);
    }

    #[test]
    fn test_not_json() {
        let err = parse_translation_record("Sure! Here is your translation: hola").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let rec = parse_translation_record(
            r#"{"detectedLang":"fr","sourceLangName":"French","translation":"hello","confidence":0.9}"#,
        )
        .unwrap();
        assert_eq!(rec.translation, "hello");
    }
}
