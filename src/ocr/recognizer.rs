//! The recognizer boundary: ranked text/confidence candidates for an image.
//!
//! The OCR model itself is opaque to the rest of the crate. Two differently
//! configured instances exist at runtime ("enhanced" and "raw"); both are
//! plain [`Recognizer`] implementations and the consensus engine treats them
//! interchangeably.

use anyhow::Result;
use image::RgbaImage;

/// A single raw reading before any validation: recognizer text plus the
/// model's confidence for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
}

impl Candidate {
    /// A non-finite confidence (NaN from a bad parse, infinities) is
    /// defaulted to 0.0 so a single malformed candidate cannot poison
    /// ranking.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: if confidence.is_finite() { confidence } else { 0.0 },
        }
    }
}

/// One recognizer invocation's output: the recognizer's own best guess (raw,
/// unvalidated text) plus the top candidates it was derived from.
#[derive(Debug, Clone, Default)]
pub struct Reading {
    /// Raw best text, if the recognizer produced one. Not yet normalized.
    pub plate: Option<String>,
    /// Confidence of the best guess; 0.0 when absent.
    pub confidence: f32,
    /// Ranked candidates, best first, at most 5.
    pub candidates: Vec<Candidate>,
}

impl Reading {
    /// The "nothing recognized" reading, used when an invocation fails.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// An opaque OCR backend.
///
/// Implementations may fail on unreadable input; the consensus engine treats
/// a failed invocation as an empty reading and moves on, so an error here is
/// never fatal to a sampling cycle.
pub trait Recognizer {
    fn recognize(&self, img: &RgbaImage) -> Result<Reading>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_sanitizes_non_finite_confidence() {
        assert_eq!(Candidate::new("X", f32::NAN).confidence, 0.0);
        assert_eq!(Candidate::new("X", f32::INFINITY).confidence, 0.0);
        assert_eq!(Candidate::new("X", 0.42).confidence, 0.42);
    }

    #[test]
    fn test_empty_reading() {
        let r = Reading::empty();
        assert!(r.plate.is_none());
        assert_eq!(r.confidence, 0.0);
        assert!(r.candidates.is_empty());
    }
}
