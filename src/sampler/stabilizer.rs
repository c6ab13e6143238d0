//! Temporal stabilization of per-cycle recognition outcomes.
//!
//! OCR on a live capture drops the plate for a frame or two all the time;
//! without smoothing the displayed value flickers. The stabilizer holds the
//! last accepted plate across a bounded window of consecutive misses and
//! only goes idle once that window elapses.

use std::time::{Duration, Instant};

use crate::ocr::RecognitionOutcome;
use crate::plate::Plate;

/// Default hold window: how long a lost plate keeps being reported.
pub const DEFAULT_HOLD_MS: u64 = 1200;

/// Per-session stabilizer state, owned by the sampling worker.
///
/// `last_accept_time` advances only on a genuine new acceptance, never on a
/// held report, so a stale value can be shown for at most the hold window
/// past its true last sighting.
#[derive(Debug, Default)]
pub struct StabilizedState {
    last_plate: Option<Plate>,
    last_confidence: f32,
    last_accept_time: Option<Instant>,
}

impl StabilizedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides the value to report for one cycle.
    ///
    /// A present plate is always accepted and refreshes the state. An absent
    /// outcome reports the held plate while it is still within `hold_window`
    /// of its last acceptance, and nothing otherwise.
    pub fn stabilize(
        &mut self,
        outcome: &RecognitionOutcome,
        now: Instant,
        hold_window: Duration,
    ) -> (Option<Plate>, f32) {
        if let Some(plate) = &outcome.plate {
            self.last_plate = Some(plate.clone());
            self.last_confidence = outcome.confidence;
            self.last_accept_time = Some(now);
            return (Some(plate.clone()), outcome.confidence);
        }

        if let (Some(plate), Some(accepted)) = (&self.last_plate, self.last_accept_time) {
            if now.duration_since(accepted) <= hold_window {
                return (Some(plate.clone()), self.last_confidence);
            }
        }

        (None, 0.0)
    }
}
