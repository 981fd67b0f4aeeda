//! Translation jobs: one per sentence, with neighbouring sentences as context.

use serde::Serialize;

/// A sentence produced by segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sentence {
    /// 1-based position within the request.
    pub id: u32,

    /// Whitespace or markup preceding the sentence in the source.
    pub prefix: String,

    /// The sentence itself.
    pub text: String,
}

impl Sentence {
    pub fn new(id: u32, prefix: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            prefix: prefix.into(),
            text: text.into(),
        }
    }
}

/// A unit of work for `LMT_handle_jobs`.
///
/// Field names follow the upstream wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub kind: &'static str,

    /// How many ranked candidates the upstream should try to return.
    pub preferred_num_beams: u32,

    pub raw_en_context_before: Vec<String>,

    pub raw_en_context_after: Vec<String>,

    /// Always a single sentence.
    pub sentences: Vec<Sentence>,
}

/// Builds one job per sentence, preserving order.
///
/// Each job sees at most the immediately preceding and following sentence.
/// The first and last jobs get empty context on their open side.
pub fn build_jobs(sentences: &[Sentence], alternative_count: u32) -> Vec<Job> {
    let beams = alternative_count.saturating_add(1).max(1);

    sentences
        .iter()
        .enumerate()
        .map(|(idx, sentence)| {
            let before = idx
                .checked_sub(1)
                .and_then(|prev| sentences.get(prev))
                .map(|s| vec![s.text.clone()])
                .unwrap_or_default();
            let after = sentences
                .get(idx + 1)
                .map(|s| vec![s.text.clone()])
                .unwrap_or_default();

            Job {
                kind: "default",
                preferred_num_beams: beams,
                raw_en_context_before: before,
                raw_en_context_after: after,
                sentences: vec![sentence.clone()],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Sentence::new(i as u32 + 1, "", *t))
            .collect()
    }

    #[test]
    fn test_single_sentence_has_no_context() {
        let jobs = build_jobs(&sentences(&["Hello world."]), 0);
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].raw_en_context_before.is_empty());
        assert!(jobs[0].raw_en_context_after.is_empty());
        assert_eq!(jobs[0].preferred_num_beams, 1);
        assert_eq!(jobs[0].kind, "default");
    }

    #[test]
    fn test_context_is_adjacent_only() {
        let jobs = build_jobs(&sentences(&["One.", "Two.", "Three."]), 3);
        assert_eq!(jobs.len(), 3);

        assert!(jobs[0].raw_en_context_before.is_empty());
        assert_eq!(jobs[0].raw_en_context_after, vec!["Two."]);

        assert_eq!(jobs[1].raw_en_context_before, vec!["One."]);
        assert_eq!(jobs[1].raw_en_context_after, vec!["Three."]);

        // No wrap-around at the end
        assert_eq!(jobs[2].raw_en_context_before, vec!["Two."]);
        assert!(jobs[2].raw_en_context_after.is_empty());
    }

    #[test]
    fn test_jobs_follow_sentence_order() {
        let input = sentences(&["a", "b", "c", "d", "e"]);
        let jobs = build_jobs(&input, 0);
        let ids: Vec<u32> = jobs.iter().map(|j| j.sentences[0].id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(jobs.iter().all(|j| j.sentences.len() == 1));
    }

    #[test]
    fn test_beam_count_tracks_alternatives() {
        let jobs = build_jobs(&sentences(&["x"]), 3);
        assert_eq!(jobs[0].preferred_num_beams, 4);

        let jobs = build_jobs(&sentences(&["x"]), u32::MAX);
        assert_eq!(jobs[0].preferred_num_beams, u32::MAX);
    }

    #[test]
    fn test_empty_input_builds_no_jobs() {
        assert!(build_jobs(&[], 2).is_empty());
    }

    #[test]
    fn test_job_wire_format() {
        let jobs = build_jobs(&[Sentence::new(1, " ", "Hi")], 1);
        let json = serde_json::to_value(&jobs[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "default",
                "preferred_num_beams": 2,
                "raw_en_context_before": [],
                "raw_en_context_after": [],
                "sentences": [{ "id": 1, "prefix": " ", "text": "Hi" }]
            })
        );
    }
}
