// src/extract.rs
//
// Turns raw fetched content into candidate occurrences: plain-text reduction,
// pattern scanning, and bounded context windows around each match.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::source::CompiledSource;

/// One detected pattern match with surrounding context, for one check cycle.
/// Ephemeral: consumed by the fingerprinter and the notification batch, never
/// persisted directly.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CandidateOccurrence {
    pub source_id: String,
    pub pattern: String,
    pub context_text: String,
    pub extracted_at: DateTime<Utc>,
}

/// Reduce an HTML page to its visible text: drop script/style blocks, strip
/// tags, decode entities. Non-HTML input passes through unchanged apart from
/// entity decoding.
pub fn page_text(raw: &str) -> String {
    static RE_SCRIPT: OnceCell<regex::Regex> = OnceCell::new();
    let re_script = RE_SCRIPT.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap()
    });
    let out = re_script.replace_all(raw, " ");

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&out, " ");

    html_escape::decode_html_entities(out.as_ref()).to_string()
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn collapse_ws(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(s, " ").trim().to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    /// Characters of context captured on each side of a match.
    pub context_chars: usize,
    /// Per-pattern candidate cap per cycle; the first N matches are kept since
    /// gazette pages list newest entries first.
    pub max_per_pattern: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            context_chars: 100,
            max_per_pattern: 5,
        }
    }
}

impl Extractor {
    pub fn new(context_chars: usize, max_per_pattern: usize) -> Self {
        Self {
            context_chars,
            max_per_pattern,
        }
    }

    /// Scan `content` for every pattern of `source`. Candidates come back in
    /// document order; when two patterns match at the same offset the one
    /// listed first wins the tie. Empty content or zero matches is a normal
    /// empty result, not an error.
    pub fn extract(&self, content: &str, source: &CompiledSource) -> Vec<CandidateOccurrence> {
        if content.is_empty() {
            return Vec::new();
        }
        let extracted_at = Utc::now();
        let mut hits: Vec<(usize, usize, CandidateOccurrence)> = Vec::new();
        for (pattern_idx, pattern) in source.patterns.iter().enumerate() {
            for m in pattern.re.find_iter(content).take(self.max_per_pattern) {
                let context_text = self.context_window(content, m.start(), m.end());
                hits.push((
                    m.start(),
                    pattern_idx,
                    CandidateOccurrence {
                        source_id: source.id().to_string(),
                        pattern: pattern.label.clone(),
                        context_text,
                        extracted_at,
                    },
                ));
            }
        }
        hits.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        hits.into_iter().map(|(_, _, c)| c).collect()
    }

    /// A window of `context_chars` characters on each side of the match,
    /// clipped to content bounds on char boundaries, whitespace-collapsed.
    fn context_window(&self, content: &str, start: usize, end: usize) -> String {
        let begin = content[..start]
            .char_indices()
            .rev()
            .take(self.context_chars)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(start);
        let stop = content[end..]
            .char_indices()
            .nth(self.context_chars)
            .map(|(i, _)| end + i)
            .unwrap_or(content.len());
        collapse_ws(&content[begin..stop])
    }
}
