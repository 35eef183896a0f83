// src/fingerprint.rs
//
// Maps a candidate occurrence to a stable, bounded identity string. Raw
// substring comparison over-matches (any boilerplate collides) and
// under-matches (a reformatted page looks brand new); anchoring on the
// edition number and date closes both holes.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::extract::CandidateOccurrence;

/// Stripped prefix length after normalization.
const PREFIX_CHARS: usize = 50;
/// Total fingerprint cap.
const MAX_CHARS: usize = 100;

/// Deterministic identity for an occurrence:
/// `{source_id}_{edition_digits}_{date_digits}_{normalized_prefix}`,
/// truncated to 100 chars. Same input always yields the same output; no
/// wall-clock, no randomness.
pub fn fingerprint(occ: &CandidateOccurrence) -> String {
    let normalized: String = occ
        .context_text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PREFIX_CHARS)
        .collect();

    let fp = format!(
        "{}_{}_{}_{}",
        occ.source_id,
        edition_digits(&occ.context_text),
        date_digits(&occ.context_text),
        normalized
    );
    fp.chars().take(MAX_CHARS).collect()
}

/// First embedded date token, `DD/MM/YYYY` or `YYYY-MM-DD`, digits only.
fn date_digits(context: &str) -> String {
    static RE_DATE: OnceCell<Regex> = OnceCell::new();
    let re = RE_DATE
        .get_or_init(|| Regex::new(r"\b(?:\d{2}/\d{2}/\d{4}|\d{4}-\d{2}-\d{2})\b").unwrap());
    re.find(context)
        .map(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default()
}

/// First run of digits, optionally with one interior `/` (edition numbers
/// like "123" or "123/2024"), digits only.
fn edition_digits(context: &str) -> String {
    static RE_EDITION: OnceCell<Regex> = OnceCell::new();
    let re = RE_EDITION.get_or_init(|| Regex::new(r"\d+(?:/\d+)?").unwrap());
    re.find(context)
        .map(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default()
}
