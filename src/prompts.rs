//! Instruction templates sent to the remote model.
//!
//! User text is embedded as a JSON string literal so quotes and newlines in
//! the input cannot break out of the instruction.

use serde_json::Value;

/// Translation prompt. The reply must follow the JSON contract checked by
/// [`parse_translation_record`](crate::structured::parse_translation_record).
pub fn translation(text: &str, target_lang: &str) -> String {
    format!(
        "Detect the language of the text below and translate it into {target}.\n\
         Reply with a single JSON object and nothing else, using exactly these keys:\n\
         {{\"detectedLang\": <ISO 639-1 code of the source>, \
         \"sourceLangName\": <English name of the source language>, \
         \"translation\": <the translated text>}}\n\
         Text: {text}",
        target = target_lang,
        text = quoted(text),
    )
}

pub fn transcription(target_lang: &str) -> String {
    format!(
        "Transcribe the speech in this recording, then translate the transcript into {}. \
         Output only the translation.",
        target_lang
    )
}

pub fn image_text(target_lang: &str) -> String {
    format!(
        "Extract all readable text from this image and translate it into {}. \
         Keep the original line breaks. Output only the translation.",
        target_lang
    )
}

/// Vocabulary recommendation prompt; `level` is a free-form learner level
/// such as "beginner" or "B2".
pub fn vocabulary(topic: &str, level: &str, target_lang: &str) -> String {
    format!(
        "Recommend 10 useful {lang} words or phrases about the topic {topic} for a {level} learner. \
         For each, give the word, its pronunciation, its meaning in English and one short example sentence. \
         Use one line per word.",
        lang = target_lang,
        topic = quoted(topic),
        level = level,
    )
}

fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_prompt_requests_contract() {
        let p = translation("hello", "zh");
        assert!(p.contains("\"detectedLang\""));
        assert!(p.contains("\"sourceLangName\""));
        assert!(p.contains("\"translation\""));
        assert!(p.contains("into zh"));
        assert!(p.ends_with("Text: \"hello\""));
    }

    #[test]
    fn test_user_text_is_escaped() {
        let p = translation("say \"hi\"\nnow", "fr");
        assert!(p.contains(r#""say \"hi\"\nnow""#));
    }

    #[test]
    fn test_media_prompts_mention_target() {
        assert!(transcription("ja").contains("into ja"));
        assert!(image_text("de").contains("into de"));
        let v = vocabulary("travel", "beginner", "es");
        assert!(v.contains("\"travel\""));
        assert!(v.contains("beginner"));
    }
}
