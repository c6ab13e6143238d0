//! Sampling loop worker.
//!
//! One dedicated thread runs the whole cycle sequentially: grab frame, build
//! variants, consensus, stabilize, resolve metadata, publish. A cooperative
//! stop flag is checked at the top of each cycle, so stopping waits for at
//! most one in-flight cycle.

use anyhow::Result;
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::capture::FrameSource;
use crate::config::WatchConfig;
use crate::ocr::{self, RecognitionOutcome, Recognizer};
use crate::prefix::PrefixMap;
use crate::sampler::queue::CycleResult;
use crate::sampler::stabilizer::StabilizedState;
use crate::store::PlateStore;

/// A running sampling session.
pub struct SamplerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SamplerHandle {
    /// Signals the worker to stop without waiting for it.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Shares the stop flag, so a thread that does not own the handle can
    /// still end the session.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Signals the worker and waits for the in-flight cycle to finish.
    pub fn stop(self) {
        self.request_stop();
        if self.thread.join().is_err() {
            crate::log("Sampling worker panicked");
        }
    }
}

/// Starts a sampling session on a dedicated worker thread.
///
/// The configured region is validated here; an invalid region is the one
/// fatal error and is reported before any cycle runs. Stabilizer state is
/// fresh per session.
pub fn start(
    config: WatchConfig,
    source: Box<dyn FrameSource + Send>,
    primary: Box<dyn Recognizer + Send>,
    secondary: Box<dyn Recognizer + Send>,
    store: PlateStore,
    prefixes: PrefixMap,
    sender: Sender<CycleResult>,
) -> Result<SamplerHandle> {
    config.region.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        run_sampling_loop(config, source, primary, secondary, store, prefixes, sender, stop_flag);
        crate::log("Sampling worker finished");
    });

    Ok(SamplerHandle { stop, thread })
}

/// The worker loop. Cycles are strictly sequential; nothing in here may
/// abort the session except the stop flag or a disconnected consumer.
#[allow(clippy::too_many_arguments)]
fn run_sampling_loop(
    config: WatchConfig,
    mut source: Box<dyn FrameSource + Send>,
    primary: Box<dyn Recognizer + Send>,
    secondary: Box<dyn Recognizer + Send>,
    mut store: PlateStore,
    prefixes: PrefixMap,
    sender: Sender<CycleResult>,
    stop: Arc<AtomicBool>,
) {
    let hold_window = Duration::from_millis(config.hold_ms);
    let mut state = StabilizedState::new();
    let mut cycle: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        let started = Instant::now();
        let captured_at = Local::now();
        cycle += 1;

        let outcome = match source.grab() {
            Ok(frame) => {
                let variants = ocr::variants(&frame);
                ocr::evaluate(&variants, primary.as_ref(), secondary.as_ref())
            }
            Err(e) => {
                crate::log(&format!("Frame grab failed: {:#}", e));
                RecognitionOutcome::empty()
            }
        };

        let (plate, confidence) = state.stabilize(&outcome, Instant::now(), hold_window);
        let region = plate.as_ref().and_then(|p| prefixes.region_for(p));
        let note = plate.as_ref().and_then(|p| store.note_for(p));

        let elapsed = started.elapsed();
        let result = CycleResult {
            cycle,
            captured_at,
            plate,
            confidence,
            region,
            note,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            candidates: outcome.candidates,
        };

        if sender.send(result).is_err() {
            crate::log("Result consumer disconnected; stopping sampler");
            break;
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        let sleep_ms = config
            .interval_ms
            .saturating_sub(elapsed_ms)
            .max(config.min_sleep_ms);
        thread::sleep(Duration::from_millis(sleep_ms));
    }
}
