//! Turns `LMT_handle_jobs` replies into the public result shape.
//!
//! Each translation entry corresponds to one job and holds ranked beams. Rank 0
//! across all entries forms the primary text; higher ranks form alternatives.

use crate::error::TranslateError;
use crate::segment::null_as_default;
use serde::{Deserialize, Serialize};

/// Account tier, decided only by whether a session credential was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn from_session(session: Option<&str>) -> Self {
        match session {
            Some(s) if !s.is_empty() => Tier::Pro,
            _ => Tier::Free,
        }
    }
}

/// Public result of a translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    /// Id of the translation request sent upstream.
    pub id: u64,

    /// The primary translation.
    #[serde(rename = "data")]
    pub text: String,

    /// Alternative translations with the same line layout as `text`.
    pub alternatives: Vec<String>,

    /// Detected source language, or the requested one when nothing was detected.
    pub source_lang: String,

    /// Target language exactly as requested.
    pub target_lang: String,

    #[serde(rename = "method")]
    pub tier: Tier,
}

/// Primary text plus alternatives for one upstream reply (or one line).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    pub text: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    result: Option<JobsResult>,
}

#[derive(Debug, Deserialize)]
struct JobsResult {
    #[serde(default, deserialize_with = "null_as_default")]
    translations: Vec<TranslationEntry>,
}

#[derive(Debug, Deserialize)]
struct TranslationEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    beams: Vec<Beam>,
}

#[derive(Debug, Deserialize)]
struct Beam {
    #[serde(default, deserialize_with = "null_as_default")]
    sentences: Vec<BeamSentence>,
}

#[derive(Debug, Deserialize)]
struct BeamSentence {
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
}

impl Beam {
    fn text(&self) -> String {
        self.sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extracts primary text and alternatives from an `LMT_handle_jobs` reply.
///
/// # Errors
///
/// `EmptyResult` when there is no `result.translations` or it is empty,
/// `NoTranslation` when rank 0 yields only whitespace.
pub fn render_translations(value: serde_json::Value) -> Result<Rendered, TranslateError> {
    let response: JobsResponse = serde_json::from_value(value)
        .map_err(|e| TranslateError::MalformedResponse(format!("unexpected shape: {}", e)))?;

    let translations = response
        .result
        .map(|r| r.translations)
        .filter(|t| !t.is_empty())
        .ok_or(TranslateError::EmptyResult)?;

    let text = join_rank(&translations, 0);
    if text.is_empty() {
        return Err(TranslateError::NoTranslation);
    }

    let max_rank = translations.iter().map(|t| t.beams.len()).max().unwrap_or(0);
    let alternatives = (1..max_rank)
        .map(|rank| join_rank(&translations, rank))
        .filter(|alt| !alt.is_empty())
        .collect();

    Ok(Rendered { text, alternatives })
}

/// Space-joins one beam rank across entries, skipping entries without it.
fn join_rank(translations: &[TranslationEntry], rank: usize) -> String {
    translations
        .iter()
        .filter_map(|t| t.beams.get(rank))
        .map(Beam::text)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Re-interleaves per-line results into multi-line text.
///
/// `None` marks a blank source line and renders as an empty line. Every
/// alternative gets one line per source line; a line lacking that rank
/// repeats its primary translation.
pub fn merge_lines(lines: &[Option<Rendered>]) -> Rendered {
    let text = lines
        .iter()
        .map(|line| line.as_ref().map(|r| r.text.as_str()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let max_alts = lines
        .iter()
        .flatten()
        .map(|r| r.alternatives.len())
        .max()
        .unwrap_or(0);

    let alternatives = (0..max_alts)
        .map(|rank| {
            lines
                .iter()
                .map(|line| match line {
                    Some(r) => r.alternatives.get(rank).unwrap_or(&r.text).as_str(),
                    None => "",
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    Rendered { text, alternatives }
}
