//! Plate text normalization, validation and confusable-character correction.
//!
//! A plate is only considered valid in its normalized form: upper-case,
//! `[A-Z0-9]` only, 1-3 letters followed by 4-5 alphanumeric characters.
//! Everything downstream of the consensus engine works with [`Plate`] values,
//! never with raw recognizer text.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::ocr::Candidate;

/// Pattern for a normalized plate: 1-3 letters, then 4-5 alphanumerics
/// (e.g. ERA75TM, KR1234A, WA1234B).
const PLATE_PATTERN: &str = "^[A-Z]{1,3}[A-Z0-9]{4,5}$";

fn plate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLATE_PATTERN).expect("plate pattern is a valid regex"))
}

/// A validated, normalized plate string.
///
/// Construction goes through [`Plate::parse`], so holding a `Plate` means the
/// text already matches the plate pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Plate(String);

impl Plate {
    /// Accepts exactly the normalized form; returns `None` for anything else.
    /// Callers normalize first (see [`normalize`]).
    pub fn parse(s: &str) -> Option<Plate> {
        if plate_regex().is_match(s) {
            Some(Plate(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upper-cases and strips everything outside `[A-Z0-9]` (spaces, dashes,
/// separators, non-ASCII).
pub fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Whole-string substitution of letters commonly misread for digits.
fn letters_to_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'O' => '0',
            'I' => '1',
            'Z' => '2',
            'S' => '5',
            other => other,
        })
        .collect()
}

/// Whole-string substitution of digits commonly misread for letters.
fn digits_to_letters(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '0' => 'O',
            '1' => 'I',
            '2' => 'Z',
            '5' => 'S',
            other => other,
        })
        .collect()
}

/// Tries to pull a valid plate out of a raw candidate list.
///
/// Candidates are ranked by confidence, descending; the sort is stable so
/// equal-confidence candidates keep their original relative order.
///
/// Pass 1 returns the first candidate whose normalized text already matches
/// the plate pattern. Pass 2 retries candidates of plausible length (5-8)
/// with the two confusable-character tables applied to the whole string,
/// letter-to-digit first. Anything that survives neither pass yields `None`.
pub fn best_plate_from_candidates(candidates: &[Candidate]) -> Option<Plate> {
    if candidates.is_empty() {
        return None;
    }

    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Pass 1: direct pattern match
    for cand in &ranked {
        if let Some(plate) = Plate::parse(&normalize(&cand.text)) {
            return Some(plate);
        }
    }

    // Pass 2: confusable-character substitution
    for cand in &ranked {
        let norm = normalize(&cand.text);
        if !(5..=8).contains(&norm.len()) {
            continue;
        }
        if let Some(plate) = Plate::parse(&letters_to_digits(&norm)) {
            return Some(plate);
        }
        if let Some(plate) = Plate::parse(&digits_to_letters(&norm)) {
            return Some(plate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands(raw: &[(&str, f32)]) -> Vec<Candidate> {
        raw.iter().map(|(t, c)| Candidate::new(*t, *c)).collect()
    }

    #[test]
    fn test_normalize_strips_and_uppercases() {
        assert_eq!(normalize("kr 1234-a"), "KR1234A");
        assert_eq!(normalize("  era 75 tm  "), "ERA75TM");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("Kr 1234a");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_plate_parse_accepts_valid() {
        assert!(Plate::parse("ERA75TM").is_some());
        assert!(Plate::parse("KR1234A").is_some());
        assert!(Plate::parse("W12345").is_some());
    }

    #[test]
    fn test_plate_parse_rejects_invalid() {
        // Too short / too long
        assert!(Plate::parse("AB12").is_none());
        assert!(Plate::parse("ABCD12345").is_none());
        // Lower-case and separators are not normalized forms
        assert!(Plate::parse("kr1234a").is_none());
        assert!(Plate::parse("KR 1234").is_none());
        // Single leading letter cannot carry a 6-char tail
        assert!(Plate::parse("K346789").is_none());
        // Must start with a letter
        assert!(Plate::parse("1234567").is_none());
    }

    #[test]
    fn test_correction_direct_match_highest_confidence_wins() {
        let plate = best_plate_from_candidates(&cands(&[("ERA75TN", 0.55), ("ERA75TM", 0.91)]));
        assert_eq!(plate.unwrap().as_str(), "ERA75TM");
    }

    #[test]
    fn test_correction_sort_is_stable_on_ties() {
        // Equal confidence: original relative order decides
        let plate = best_plate_from_candidates(&cands(&[("ERA75TM", 0.5), ("KR1234A", 0.5)]));
        assert_eq!(plate.unwrap().as_str(), "ERA75TM");

        let plate = best_plate_from_candidates(&cands(&[("KR1234A", 0.5), ("ERA75TM", 0.5)]));
        assert_eq!(plate.unwrap().as_str(), "KR1234A");
    }

    #[test]
    fn test_correction_normalizes_before_matching() {
        let plate = best_plate_from_candidates(&cands(&[("kr 1234-a", 0.3)]));
        assert_eq!(plate.unwrap().as_str(), "KR1234A");
    }

    #[test]
    fn test_correction_digit_to_letter_rescue() {
        // "0KX6789" starts with a digit, so it fails the direct match; the
        // digit-to-letter table turns the leading 0 into O.
        let plate = best_plate_from_candidates(&cands(&[("0KX6789", 0.4)]));
        assert_eq!(plate.unwrap().as_str(), "OKX6789");
    }

    #[test]
    fn test_correction_substitution_is_whole_string() {
        // Every mapped character flips, not just the broken one: the 5 in
        // "0RA75TM" becomes S alongside the leading 0 becoming O.
        let plate = best_plate_from_candidates(&cands(&[("0RA75TM", 0.4)]));
        assert_eq!(plate.unwrap().as_str(), "ORA7STM");
    }

    #[test]
    fn test_correction_skips_substitution_outside_length_bounds() {
        // 9 normalized chars: pass 2 must not even try
        assert!(best_plate_from_candidates(&cands(&[("012345678", 0.9)])).is_none());
    }

    #[test]
    fn test_correction_returns_none_when_nothing_survives() {
        assert!(best_plate_from_candidates(&[]).is_none());
        assert!(best_plate_from_candidates(&cands(&[("K346789", 0.9)])).is_none());
        assert!(best_plate_from_candidates(&cands(&[("???", 0.9)])).is_none());
    }

    #[test]
    fn test_correction_handles_nan_confidence() {
        // A candidate with an unparseable confidence is sanitized to 0.0 at
        // construction and must not break the ranking.
        let list = vec![Candidate::new("KR1234A", f32::NAN), Candidate::new("ERA75TM", 0.2)];
        let plate = best_plate_from_candidates(&list);
        assert_eq!(plate.unwrap().as_str(), "ERA75TM");
    }
}
