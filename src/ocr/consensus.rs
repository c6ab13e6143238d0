//! Recognition consensus: one accepted plate per sampling cycle, or none.
//!
//! A cycle walks an explicit ordered attempt list (each image variant, primary
//! recognizer then secondary) and folds the attempts into a single running
//! best. Replacement is non-strict (`>=`) so the most recent reading wins a
//! confidence tie, and the walk stops early once the running best is
//! confident enough.

use image::RgbaImage;

use super::recognizer::{Candidate, Reading, Recognizer};
use crate::plate::{self, Plate};

/// Confidence at which a cycle stops issuing further attempts.
const EARLY_EXIT_CONFIDENCE: f32 = 0.70;

/// Confidence floor for a plate recovered by the end-of-cycle fallback.
const FALLBACK_FLOOR: f32 = 0.50;

/// The consensus result for one sampling cycle.
#[derive(Debug, Clone, Default)]
pub struct RecognitionOutcome {
    pub plate: Option<Plate>,
    pub confidence: f32,
    pub candidates: Vec<Candidate>,
}

impl RecognitionOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Evaluates one cycle across all variants and both recognizer instances.
///
/// `variants` is the ordered, non-empty list from the variant generator;
/// `primary`/`secondary` ordering is the caller's mode (enhanced-first or
/// raw-first). A recognizer failure counts as an empty attempt and never
/// aborts the cycle.
pub fn evaluate(
    variants: &[RgbaImage],
    primary: &dyn Recognizer,
    secondary: &dyn Recognizer,
) -> RecognitionOutcome {
    let mut best_plate: Option<Plate> = None;
    let mut best_confidence: f32 = -1.0;
    let mut best_candidates: Vec<Candidate> = Vec::new();
    let mut last_candidates: Vec<Candidate> = Vec::new();

    'attempts: for variant in variants {
        for recognizer in [primary, secondary] {
            let reading = match recognizer.recognize(variant) {
                Ok(reading) => reading,
                Err(e) => {
                    crate::log(&format!("Recognizer attempt failed: {:#}", e));
                    Reading::empty()
                }
            };

            let (plate, confidence) = screen_reading(&reading);
            last_candidates = reading.candidates;

            if let Some(plate) = plate {
                if confidence >= best_confidence {
                    best_plate = Some(plate);
                    best_confidence = confidence;
                    best_candidates = last_candidates.clone();
                    if best_confidence >= EARLY_EXIT_CONFIDENCE {
                        break 'attempts;
                    }
                }
            }
        }
    }

    // Last-ditch recovery over the final attempt's candidates only. The
    // earlier attempts' candidate lists are intentionally not pooled here.
    if best_plate.is_none() {
        if let Some(plate) = plate::best_plate_from_candidates(&last_candidates) {
            best_plate = Some(plate);
            best_confidence = best_confidence.max(FALLBACK_FLOOR);
            best_candidates = last_candidates;
        }
    }

    RecognitionOutcome {
        plate: best_plate,
        confidence: best_confidence.max(0.0),
        candidates: best_candidates,
    }
}

/// Validates one reading: the recognizer's own best text if it normalizes to
/// a valid plate, otherwise whatever the correction procedure can extract
/// from the candidate list. The reading's confidence applies either way.
fn screen_reading(reading: &Reading) -> (Option<Plate>, f32) {
    let confidence = if reading.confidence.is_finite() {
        reading.confidence
    } else {
        0.0
    };

    let plate = reading
        .plate
        .as_deref()
        .and_then(|raw| Plate::parse(&plate::normalize(raw)))
        .or_else(|| plate::best_plate_from_candidates(&reading.candidates));

    (plate, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays a fixed sequence of results, then empty readings forever.
    struct ScriptedRecognizer {
        script: RefCell<VecDeque<anyhow::Result<Reading>>>,
        calls: Cell<usize>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<anyhow::Result<Reading>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                calls: Cell::new(0),
            }
        }

        fn empty() -> Self {
            Self::new(Vec::new())
        }

        fn calls(&self) -> usize {
            self.calls.get()
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&self, _img: &RgbaImage) -> anyhow::Result<Reading> {
            self.calls.set(self.calls.get() + 1);
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Reading::empty()))
        }
    }

    fn reading(plate: Option<&str>, confidence: f32, cands: &[(&str, f32)]) -> Reading {
        Reading {
            plate: plate.map(str::to_string),
            confidence,
            candidates: cands.iter().map(|(t, c)| Candidate::new(*t, *c)).collect(),
        }
    }

    fn frames(n: usize) -> Vec<RgbaImage> {
        (0..n).map(|_| RgbaImage::new(4, 4)).collect()
    }

    #[test]
    fn test_direct_match_highest_confidence() {
        // Scenario: two candidates, the higher-confidence one matches
        let primary = ScriptedRecognizer::new(vec![Ok(reading(
            None,
            0.91,
            &[("ERA75TN", 0.55), ("ERA75TM", 0.91)],
        ))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "ERA75TM");
        assert!((outcome.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_correction_rescues_confusable_reading() {
        // Only reading starts with a misread 0; rescued by the digit-to-letter
        // table at the reading's own confidence.
        let primary = ScriptedRecognizer::new(vec![Ok(reading(
            None,
            0.40,
            &[("0KX6789", 0.40)],
        ))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "OKX6789");
        assert!((outcome.confidence - 0.40).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_raw_plate_falls_back_to_candidates() {
        // The recognizer's own best text is junk; extraction still finds a
        // valid plate further down its candidate list.
        let primary = ScriptedRecognizer::new(vec![Ok(reading(
            Some("K346789"),
            0.60,
            &[("K346789", 0.60), ("KR1234A", 0.35)],
        ))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "KR1234A");
        assert!((outcome.confidence - 0.60).abs() < 1e-6);
    }

    #[test]
    fn test_early_exit_stops_further_attempts() {
        let primary = ScriptedRecognizer::new(vec![Ok(reading(Some("ERA75TM"), 0.91, &[]))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(3), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "ERA75TM");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0, "secondary never runs after early exit");
    }

    #[test]
    fn test_below_threshold_exhausts_all_attempts() {
        let primary = ScriptedRecognizer::new(vec![Ok(reading(Some("ERA75TM"), 0.50, &[]))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(2), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "ERA75TM");
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 2);
    }

    #[test]
    fn test_replacement_is_non_strict() {
        // Same confidence on a later attempt: the later reading wins
        let primary = ScriptedRecognizer::new(vec![Ok(reading(Some("ERA75TM"), 0.50, &[]))]);
        let secondary = ScriptedRecognizer::new(vec![Ok(reading(Some("KR1234A"), 0.50, &[]))]);

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "KR1234A");
    }

    #[test]
    fn test_lower_confidence_does_not_replace() {
        let primary = ScriptedRecognizer::new(vec![Ok(reading(Some("ERA75TM"), 0.60, &[]))]);
        let secondary = ScriptedRecognizer::new(vec![Ok(reading(Some("KR1234A"), 0.30, &[]))]);

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "ERA75TM");
        assert!((outcome.confidence - 0.60).abs() < 1e-6);
    }

    #[test]
    fn test_recognizer_failure_is_not_fatal() {
        let primary = ScriptedRecognizer::new(vec![Err(anyhow!("unreadable image"))]);
        let secondary = ScriptedRecognizer::new(vec![Ok(reading(Some("WA1234B"), 0.55, &[]))]);

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.plate.unwrap().as_str(), "WA1234B");
    }

    #[test]
    fn test_no_plate_anywhere_yields_empty_outcome() {
        let primary = ScriptedRecognizer::empty();
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(2), &primary, &secondary);
        assert!(outcome.plate.is_none());
        assert_eq!(outcome.confidence, 0.0, "confidence is floored at zero");
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_unextractable_candidates_stay_absent() {
        // Candidates survive no pass of the correction procedure in any
        // attempt, including the final-fallback run over the last attempt.
        let junk = || Ok(reading(None, 0.2, &[("K346789", 0.9), ("???", 0.8)]));
        let primary = ScriptedRecognizer::new(vec![junk(), junk()]);
        let secondary = ScriptedRecognizer::new(vec![junk(), junk()]);

        let outcome = evaluate(&frames(2), &primary, &secondary);
        assert!(outcome.plate.is_none());
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn test_outcome_carries_best_attempt_candidates() {
        let primary = ScriptedRecognizer::new(vec![Ok(reading(
            Some("ERA75TM"),
            0.80,
            &[("ERA75TM", 0.80), ("ERA75TN", 0.40)],
        ))]);
        let secondary = ScriptedRecognizer::empty();

        let outcome = evaluate(&frames(1), &primary, &secondary);
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].text, "ERA75TM");
    }
}
