//! JSON-RPC payloads for the upstream translation endpoint.
//!
//! Two methods are spoken: `LMT_split_text` for segmentation and
//! `LMT_handle_jobs` for translation. Encoding ends with a byte-level rewrite of
//! the `"method"` member that the upstream uses to tell real clients apart.

use crate::error::TranslateError;
use crate::jobs::Job;
use crate::segment::TextType;
use serde::Serialize;
use std::str::FromStr;

pub const METHOD_SPLIT_TEXT: &str = "LMT_split_text";
pub const METHOD_HANDLE_JOBS: &str = "LMT_handle_jobs";

const JSONRPC_VERSION: &str = "2.0";

/// Value sent for an unset or auto-detected source language.
const AUTO_LANG: &str = "AUTO";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcEnvelope<P> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub id: u64,
    pub params: P,
}

impl<P: Serialize> RpcEnvelope<P> {
    pub fn new(method: &'static str, id: u64, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            id,
            params,
        }
    }

    /// Serializes the envelope and applies the method spacing rewrite.
    pub fn encode(&self) -> Result<String, TranslateError> {
        let raw = serde_json::to_string(self)?;
        Ok(apply_method_spacing(&raw, self.id))
    }
}

/// Whether the id selects the `"method" : "` spelling.
pub fn uses_spaced_colon(id: u64) -> bool {
    (id + 5) % 29 == 0 || (id + 3) % 13 == 0
}

/// Rewrites the first `"method":"` in serialized JSON.
///
/// Ids selected by [`uses_spaced_colon`] get a space on both sides of the
/// colon, all others get a single space after it.
pub fn apply_method_spacing(serialized: &str, id: u64) -> String {
    let replacement = if uses_spaced_colon(id) {
        r#""method" : ""#
    } else {
        r#""method": ""#
    };
    serialized.replacen(r#""method":""#, replacement, 1)
}

/// Which member of `params.lang` carries the source language.
///
/// Upstream protocol revisions disagree on the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLangField {
    #[default]
    Computed,
    UserSelected,
}

impl FromStr for SourceLangField {
    type Err = std::convert::Infallible;

    /// Accepts "user_selected" (or "user"); anything else means computed.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "user_selected" | "user" | "source_lang_user_selected" => {
                SourceLangField::UserSelected
            }
            _ => SourceLangField::Computed,
        })
    }
}

/// A target language split into its primary subtag and optional region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    /// Uppercased primary subtag, e.g. `PT`.
    pub code: String,

    /// The full tag as requested, e.g. `PT-BR`, when a region was given.
    pub regional_variant: Option<String>,
}

impl TargetLanguage {
    pub fn parse(target: &str) -> Self {
        let target = target.trim();
        match target.split_once('-') {
            Some((primary, _)) => Self {
                code: primary.to_uppercase(),
                regional_variant: Some(target.to_string()),
            },
            None => Self {
                code: target.to_uppercase(),
                regional_variant: None,
            },
        }
    }
}

/// Uppercases a source language, mapping unset or `auto` to `AUTO`.
pub fn normalize_source_lang(source: &str) -> String {
    let source = source.trim();
    if source.is_empty() || source.eq_ignore_ascii_case("auto") {
        AUTO_LANG.to_string()
    } else {
        source.to_uppercase()
    }
}

/// `params` of `LMT_split_text`.
#[derive(Debug, Clone, Serialize)]
pub struct SplitParams {
    pub texts: Vec<String>,
    pub lang: SplitLang,
    pub splitting: &'static str,
    pub text_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitLang {
    pub lang_user_selected: &'static str,
}

/// Builds an `LMT_split_text` request asking for newline splitting and detection.
pub fn split_request(id: u64, text: &str, text_type: TextType) -> RpcEnvelope<SplitParams> {
    RpcEnvelope::new(
        METHOD_SPLIT_TEXT,
        id,
        SplitParams {
            texts: vec![text.to_string()],
            lang: SplitLang {
                lang_user_selected: "auto",
            },
            splitting: "newlines",
            text_type: text_type.as_str(),
        },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct LangParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_lang_user_selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_lang_computed: Option<String>,
    pub target_lang: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonJobParams {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formality: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribe_as: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_spoken: Option<bool>,
}

/// `params` of `LMT_handle_jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct HandleJobsParams {
    pub jobs: Vec<Job>,
    pub lang: LangParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(rename = "commonJobParams")]
    pub common_job_params: CommonJobParams,
    pub timestamp: u64,
}

/// Knobs for an `LMT_handle_jobs` request that do not come from the jobs.
#[derive(Debug, Clone)]
pub struct JobsOptions<'a> {
    /// Detected or requested source language, as given.
    pub source_lang: &'a str,
    pub target: &'a TargetLanguage,
    pub source_field: SourceLangField,
    /// Adds the formality/transcription defaults of the richer protocol.
    pub extended: bool,
    pub text_type: TextType,
    pub priority: Option<u32>,
    pub timestamp: u64,
}

/// Builds an `LMT_handle_jobs` request.
pub fn handle_jobs_request(
    id: u64,
    jobs: Vec<Job>,
    opts: &JobsOptions<'_>,
) -> RpcEnvelope<HandleJobsParams> {
    let source = normalize_source_lang(opts.source_lang);
    let (user_selected, computed) = match opts.source_field {
        SourceLangField::Computed => (None, Some(source)),
        SourceLangField::UserSelected => (Some(source), None),
    };

    let mut common = CommonJobParams {
        mode: "translate",
        regional_variant: opts.target.regional_variant.clone(),
        formality: None,
        transcribe_as: None,
        advanced_mode: None,
        text_type: None,
        was_spoken: None,
    };
    if opts.extended {
        common.formality = Some("undefined");
        common.transcribe_as = Some("romanize");
        common.advanced_mode = Some(false);
        common.text_type = Some(opts.text_type.as_str());
        common.was_spoken = Some(false);
    }

    RpcEnvelope::new(
        METHOD_HANDLE_JOBS,
        id,
        HandleJobsParams {
            jobs,
            lang: LangParams {
                source_lang_user_selected: user_selected,
                source_lang_computed: computed,
                target_lang: opts.target.code.clone(),
            },
            priority: opts.priority,
            common_job_params: common,
            timestamp: opts.timestamp,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{build_jobs, Sentence};

    fn options<'a>(target: &'a TargetLanguage) -> JobsOptions<'a> {
        JobsOptions {
            source_lang: "auto",
            target,
            source_field: SourceLangField::Computed,
            extended: false,
            text_type: TextType::Plaintext,
            priority: Some(1),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_spacing_is_pure_function_of_id() {
        let raw = r#"{"jsonrpc":"2.0","method":"LMT_handle_jobs","id":1}"#;
        for id in 0u64..2000 {
            let out = apply_method_spacing(raw, id);
            if (id + 5) % 29 == 0 || (id + 3) % 13 == 0 {
                assert!(out.contains(r#""method" : ""#), "id = {}", id);
            } else {
                assert!(out.contains(r#""method": ""#), "id = {}", id);
                assert!(!out.contains(r#""method" : ""#), "id = {}", id);
            }
            assert!(!out.contains(r#""method":""#));
        }
    }

    #[test]
    fn test_spacing_known_ids() {
        // 24 + 5 = 29
        assert!(uses_spaced_colon(24));
        // 10 + 3 = 13
        assert!(uses_spaced_colon(10));
        assert!(!uses_spaced_colon(8_300_000_000));
    }

    #[test]
    fn test_spacing_rewrites_first_occurrence_only() {
        let raw = r#"{"method":"a","params":{"text":"\"method\":\"x"}}"#;
        let out = apply_method_spacing(raw, 1);
        assert!(out.starts_with(r#"{"method": "a""#));
        assert_eq!(out.matches(r#""method": ""#).count(), 1);
    }

    #[test]
    fn test_encoded_envelope_keeps_member_order() {
        let envelope = split_request(8_300_000_000, "Hello", TextType::Plaintext);
        let encoded = envelope.encode().unwrap();
        assert!(encoded.starts_with(r#"{"jsonrpc":"2.0","method": "LMT_split_text","id":8300000000"#));
        // Still valid JSON after the rewrite
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["params"]["splitting"], "newlines");
        assert_eq!(value["params"]["text_type"], "plaintext");
        assert_eq!(value["params"]["lang"]["lang_user_selected"], "auto");
        assert_eq!(value["params"]["texts"][0], "Hello");
    }

    #[test]
    fn test_target_language_parse() {
        assert_eq!(
            TargetLanguage::parse("PT-BR"),
            TargetLanguage {
                code: "PT".into(),
                regional_variant: Some("PT-BR".into())
            }
        );
        assert_eq!(
            TargetLanguage::parse("ru"),
            TargetLanguage {
                code: "RU".into(),
                regional_variant: None
            }
        );
        assert_eq!(TargetLanguage::parse("en-us").code, "EN");
    }

    #[test]
    fn test_normalize_source_lang() {
        assert_eq!(normalize_source_lang(""), "AUTO");
        assert_eq!(normalize_source_lang("auto"), "AUTO");
        assert_eq!(normalize_source_lang("Auto"), "AUTO");
        assert_eq!(normalize_source_lang("en"), "EN");
    }

    #[test]
    fn test_regional_variant_in_payload() {
        let target = TargetLanguage::parse("PT-BR");
        let jobs = build_jobs(&[Sentence::new(1, "", "Hi")], 0);
        let value = serde_json::to_value(handle_jobs_request(10, jobs, &options(&target))).unwrap();

        assert_eq!(value["params"]["lang"]["target_lang"], "PT");
        assert_eq!(value["params"]["commonJobParams"]["regionalVariant"], "PT-BR");
        assert_eq!(value["params"]["commonJobParams"]["mode"], "translate");
        assert_eq!(value["params"]["lang"]["source_lang_computed"], "AUTO");
        assert!(value["params"]["lang"].get("source_lang_user_selected").is_none());
        assert_eq!(value["params"]["priority"], 1);
        assert_eq!(value["params"]["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_no_regional_variant_without_region() {
        let target = TargetLanguage::parse("RU");
        let value = serde_json::to_value(handle_jobs_request(10, vec![], &options(&target))).unwrap();
        assert!(value["params"]["commonJobParams"].get("regionalVariant").is_none());
        assert!(value["params"]["commonJobParams"].get("formality").is_none());
    }

    #[test]
    fn test_user_selected_field_and_extended_params() {
        let target = TargetLanguage::parse("DE");
        let mut opts = options(&target);
        opts.source_lang = "en";
        opts.source_field = SourceLangField::UserSelected;
        opts.extended = true;
        opts.priority = None;
        opts.text_type = TextType::Richtext;

        let value = serde_json::to_value(handle_jobs_request(10, vec![], &opts)).unwrap();
        let lang = &value["params"]["lang"];
        assert_eq!(lang["source_lang_user_selected"], "EN");
        assert!(lang.get("source_lang_computed").is_none());

        let common = &value["params"]["commonJobParams"];
        assert_eq!(common["formality"], "undefined");
        assert_eq!(common["transcribeAs"], "romanize");
        assert_eq!(common["advancedMode"], false);
        assert_eq!(common["textType"], "richtext");
        assert_eq!(common["wasSpoken"], false);
        assert!(value["params"].get("priority").is_none());
    }

    #[test]
    fn test_source_lang_field_from_str() {
        assert_eq!(
            "user_selected".parse::<SourceLangField>().unwrap(),
            SourceLangField::UserSelected
        );
        assert_eq!(
            "computed".parse::<SourceLangField>().unwrap(),
            SourceLangField::Computed
        );
        assert_eq!("".parse::<SourceLangField>().unwrap(), SourceLangField::Computed);
    }
}
