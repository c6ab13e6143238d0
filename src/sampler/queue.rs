//! Result channel between the sampling worker and the presentation layer.
//!
//! Uses std::sync::mpsc for single-producer, single-consumer handoff. The
//! worker publishes one [`CycleResult`] per cycle and never blocks on the
//! consumer; a dropped receiver ends the sampling session.

use chrono::{DateTime, Local};
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::ocr::Candidate;
use crate::plate::Plate;
use crate::store::NoteRecord;

/// Everything downstream consumers get to see about one sampling cycle.
/// Immutable once published.
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// Cycle number within the session, 1-based.
    pub cycle: u64,
    /// Wall-clock time the frame was captured.
    pub captured_at: DateTime<Local>,
    /// The stabilized plate, if any.
    pub plate: Option<Plate>,
    /// Confidence reported alongside the plate; 0.0 when absent.
    pub confidence: f32,
    /// Administrative region resolved from the plate prefix.
    pub region: Option<String>,
    /// Locally stored note for the plate.
    pub note: Option<NoteRecord>,
    /// How long the cycle's own work took.
    pub elapsed_ms: f64,
    /// Raw candidates behind the accepted outcome, for display.
    pub candidates: Vec<Candidate>,
}

/// Creates the session result channel.
///
/// The sender side belongs to the sampling worker, the receiver to the
/// presentation layer. Unbounded: the consumer is expected to drain promptly,
/// and the worker treats a send failure as "session over".
pub fn create_result_channel() -> (Sender<CycleResult>, Receiver<CycleResult>) {
    channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cycle: u64) -> CycleResult {
        CycleResult {
            cycle,
            captured_at: Local::now(),
            plate: Plate::parse("KR1234A"),
            confidence: 0.9,
            region: Some("Kraków".to_string()),
            note: None,
            elapsed_ms: 12.0,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_channel_send_receive() {
        let (sender, receiver) = create_result_channel();
        sender.send(result(1)).expect("Failed to send");

        let received = receiver.recv().expect("Failed to receive");
        assert_eq!(received.cycle, 1);
        assert_eq!(received.plate.unwrap().as_str(), "KR1234A");
    }

    #[test]
    fn test_channel_preserves_order() {
        let (sender, receiver) = create_result_channel();
        for i in 1..=5 {
            sender.send(result(i)).expect("Failed to send");
        }
        for i in 1..=5 {
            assert_eq!(receiver.recv().expect("Failed to receive").cycle, i);
        }
    }

    #[test]
    fn test_send_fails_after_receiver_dropped() {
        let (sender, receiver) = create_result_channel();
        drop(receiver);
        assert!(sender.send(result(1)).is_err());
    }
}
