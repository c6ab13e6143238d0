//! Plate recognition: recognizer boundary, image variants, and the
//! per-cycle consensus engine.

pub mod consensus;
pub mod engine;
pub mod preprocess;
pub mod recognizer;

pub use consensus::{evaluate, RecognitionOutcome};
pub use engine::TesseractRecognizer;
pub use preprocess::variants;
pub use recognizer::{Candidate, Reading, Recognizer};
