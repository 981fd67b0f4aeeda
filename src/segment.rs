//! Text segmentation.
//!
//! Text is either split by the upstream (`LMT_split_text`, which also detects
//! the source language) or locally on newlines. Both keep source order.

use crate::error::TranslateError;
use crate::jobs::Sentence;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// How the caller wants markup in the text treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagHandling {
    #[default]
    Plaintext,
    Html,
    Xml,
}

impl FromStr for TagHandling {
    type Err = std::convert::Infallible;

    /// Accepts "html"/"richtext" and "xml"; anything else is plaintext.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "html" | "richtext" => TagHandling::Html,
            "xml" => TagHandling::Xml,
            _ => TagHandling::Plaintext,
        })
    }
}

impl TagHandling {
    pub fn is_markup(self) -> bool {
        matches!(self, TagHandling::Html | TagHandling::Xml)
    }
}

/// The upstream's `text_type` / `textType` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Plaintext,
    Richtext,
}

impl TextType {
    pub fn as_str(self) -> &'static str {
        match self {
            TextType::Plaintext => "plaintext",
            TextType::Richtext => "richtext",
        }
    }
}

/// Whether the text looks like it contains markup.
pub fn is_rich_text(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

/// Picks the text type from the caller's tag handling, falling back to sniffing.
pub fn text_type_for(text: &str, tag_handling: TagHandling) -> TextType {
    if tag_handling.is_markup() || is_rich_text(text) {
        TextType::Richtext
    } else {
        TextType::Plaintext
    }
}

/// Output of remote segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// Language the upstream detected, if any.
    pub detected_lang: Option<String>,

    /// Sentences in source order, ids starting at 1.
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
struct SplitResponse {
    result: Option<SplitResult>,
}

#[derive(Debug, Deserialize)]
struct SplitResult {
    #[serde(default, deserialize_with = "null_as_default")]
    lang: SplitLang,
    #[serde(default, deserialize_with = "null_as_default")]
    texts: Vec<SplitText>,
}

#[derive(Debug, Default, Deserialize)]
struct SplitLang {
    detected: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SplitText {
    #[serde(default, deserialize_with = "null_as_default")]
    chunks: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default, deserialize_with = "null_as_default")]
    sentences: Vec<ChunkSentence>,
}

#[derive(Debug, Deserialize)]
struct ChunkSentence {
    #[serde(default, deserialize_with = "null_as_default")]
    prefix: String,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
}

/// Reads a missing or `null` field as its default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Extracts sentences and the detected language from an `LMT_split_text` reply.
///
/// Each chunk contributes its first sentence.
pub fn parse_split_response(value: serde_json::Value) -> Result<Segmentation, TranslateError> {
    let response: SplitResponse = serde_json::from_value(value)
        .map_err(|e| TranslateError::SegmentationFailed(format!("unexpected shape: {}", e)))?;

    let result = response
        .result
        .ok_or_else(|| TranslateError::SegmentationFailed("response has no result".into()))?;

    let text = result
        .texts
        .into_iter()
        .next()
        .ok_or_else(|| TranslateError::SegmentationFailed("response has no texts".into()))?;

    let mut sentences = Vec::with_capacity(text.chunks.len());
    for (idx, chunk) in text.chunks.into_iter().enumerate() {
        let first = chunk.sentences.into_iter().next().ok_or_else(|| {
            TranslateError::SegmentationFailed(format!("chunk {} has no sentences", idx))
        })?;
        sentences.push(Sentence::new(idx as u32 + 1, first.prefix, first.text));
    }

    if sentences.is_empty() {
        return Err(TranslateError::SegmentationFailed(
            "response has no sentences".into(),
        ));
    }

    let detected_lang = result.lang.detected.filter(|lang| !lang.trim().is_empty());

    Ok(Segmentation {
        detected_lang,
        sentences,
    })
}

/// Splits text on `\n`.
///
/// Returns one slot per line: `None` for blank lines, which are never sent
/// upstream, and a single sentence with id 1 for every other line, since each
/// line travels in its own request.
pub fn split_lines(text: &str) -> Vec<Option<Sentence>> {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                None
            } else {
                Some(Sentence::new(1, "", line))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_ascii_is_not_rich_text() {
        for text in ["Hello world", "a", "1 + 1 = 2", "what? yes!"] {
            assert!(!is_rich_text(text));
            assert_eq!(
                text_type_for(text, TagHandling::Plaintext),
                TextType::Plaintext
            );
            assert_eq!(text_type_for(text, TagHandling::Plaintext).as_str(), "plaintext");
        }
    }

    #[test]
    fn test_rich_text_needs_both_brackets() {
        assert!(is_rich_text("<b>bold</b>"));
        assert!(!is_rich_text("a < b"));
        assert!(!is_rich_text("a > b"));
        assert_eq!(
            text_type_for("<p>x</p>", TagHandling::Plaintext),
            TextType::Richtext
        );
    }

    #[test]
    fn test_markup_tag_handling_forces_richtext() {
        assert_eq!(text_type_for("plain", TagHandling::Html), TextType::Richtext);
        assert_eq!(text_type_for("plain", TagHandling::Xml), TextType::Richtext);
    }

    #[test]
    fn test_tag_handling_from_str() {
        assert_eq!("html".parse::<TagHandling>().unwrap(), TagHandling::Html);
        assert_eq!("XML".parse::<TagHandling>().unwrap(), TagHandling::Xml);
        assert_eq!("richtext".parse::<TagHandling>().unwrap(), TagHandling::Html);
        assert_eq!("".parse::<TagHandling>().unwrap(), TagHandling::Plaintext);
        assert_eq!("whatever".parse::<TagHandling>().unwrap(), TagHandling::Plaintext);
    }

    #[test]
    fn test_parse_split_response() {
        let value = json!({
            "jsonrpc": "2.0",
            "id": 8300001000u64,
            "result": {
                "lang": { "detected": "EN", "isConfident": true },
                "texts": [{
                    "chunks": [
                        { "sentences": [{ "prefix": "", "text": "Hello world." }] },
                        { "sentences": [{ "prefix": " ", "text": "How are you?" }] }
                    ]
                }]
            }
        });

        let seg = parse_split_response(value).unwrap();
        assert_eq!(seg.detected_lang.as_deref(), Some("EN"));
        assert_eq!(
            seg.sentences,
            vec![
                Sentence::new(1, "", "Hello world."),
                Sentence::new(2, " ", "How are you?"),
            ]
        );
    }

    #[test]
    fn test_parse_split_response_without_result() {
        let value = json!({ "jsonrpc": "2.0", "error": { "code": 1042912, "message": "Too many requests" } });
        match parse_split_response(value) {
            Err(TranslateError::SegmentationFailed(_)) => {}
            other => panic!("Expected SegmentationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_split_response_empty_chunk() {
        let value = json!({
            "result": { "lang": {}, "texts": [{ "chunks": [{ "sentences": [] }] }] }
        });
        assert!(matches!(
            parse_split_response(value),
            Err(TranslateError::SegmentationFailed(_))
        ));
    }

    #[test]
    fn test_parse_split_response_blank_detection() {
        let value = json!({
            "result": {
                "lang": { "detected": "" },
                "texts": [{ "chunks": [{ "sentences": [{ "text": "x" }] }] }]
            }
        });
        let seg = parse_split_response(value).unwrap();
        assert_eq!(seg.detected_lang, None);
        assert_eq!(seg.sentences[0].prefix, "");
    }

    #[test]
    fn test_parse_split_response_tolerates_nulls() {
        let value = json!({
            "result": {
                "lang": null,
                "texts": [{
                    "chunks": [
                        { "sentences": [{ "prefix": null, "text": "Hello." }] },
                        { "sentences": [{ "prefix": " ", "text": "Bye." }] }
                    ]
                }]
            }
        });
        let seg = parse_split_response(value).unwrap();
        assert_eq!(seg.detected_lang, None);
        assert_eq!(seg.sentences[0], Sentence::new(1, "", "Hello."));
        assert_eq!(seg.sentences[1], Sentence::new(2, " ", "Bye."));

        let no_chunks = json!({ "result": { "texts": [{ "chunks": null }] } });
        assert!(matches!(
            parse_split_response(no_chunks),
            Err(TranslateError::SegmentationFailed(_))
        ));
    }

    #[test]
    fn test_split_lines_keeps_blank_slots() {
        let lines = split_lines("Hello\n\nWorld");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], Some(Sentence::new(1, "", "Hello")));
        assert_eq!(lines[1], None);
        assert_eq!(lines[2], Some(Sentence::new(1, "", "World")));
    }

    #[test]
    fn test_split_lines_whitespace_line_is_blank() {
        let lines = split_lines("a\n   \n");
        assert_eq!(lines, vec![Some(Sentence::new(1, "", "a")), None, None]);
    }
}
