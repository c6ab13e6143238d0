//! Platewatch
//!
//! Continuously samples a screen region for a vehicle license plate, runs a
//! dual-recognizer consensus over several image variants, stabilizes the
//! result across transient misses, and prints each cycle's outcome together
//! with the plate's administrative region and any locally stored note.

mod capture;
mod config;
mod ocr;
mod paths;
mod plate;
mod prefix;
mod sampler;
mod store;

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::Ordering;

use crate::capture::ImageDirSource;
use crate::ocr::{Recognizer, TesseractRecognizer};
use crate::prefix::PrefixMap;
use crate::sampler::CycleResult;
use crate::store::PlateStore;

/// Appends a line to the session log file, best effort.
fn append_log_line(line: &str) {
    let log_path = paths::get_logs_dir().join("platewatch.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    append_log_line(&line);
}

/// Set up panic hook to log panics. The sampling worker runs detached, so a
/// crash must land in the log file, not just on a closed console.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        let timestamp = Local::now().format("%H:%M:%S%.3f");
        let line = format!("[{}] [PANIC]{} {}\n", timestamp, location, msg);
        eprint!("{}", line);
        append_log_line(&line);
    }));
}

fn main() -> Result<()> {
    install_panic_hook();

    paths::ensure_directories()?;
    config::init_config();
    let cfg = config::get_config();

    // The one fatal startup check: a session with a degenerate region or a
    // missing frame directory must fail here, not mid-stream.
    cfg.region.validate()?;
    let source = ImageDirSource::new(paths::resolve_dir(&cfg.frames_dir), cfg.region)
        .context("Cannot start sampling")?;

    let enhanced = TesseractRecognizer::enhanced(&cfg.tesseract_cmd, cfg.enhance_threshold);
    let raw = TesseractRecognizer::raw(&cfg.tesseract_cmd);
    let (primary, secondary): (Box<dyn Recognizer + Send>, Box<dyn Recognizer + Send>) =
        if cfg.prefer_enhanced {
            (Box::new(enhanced), Box::new(raw))
        } else {
            (Box::new(raw), Box::new(enhanced))
        };

    let store = PlateStore::new(paths::get_plates_db_path());
    let prefixes = PrefixMap::load(&paths::get_prefix_map_path());

    log(&format!(
        "Starting sampling: region {}x{} at ({}, {}), every {} ms",
        cfg.region.width, cfg.region.height, cfg.region.x, cfg.region.y, cfg.interval_ms
    ));

    let (sender, receiver) = sampler::create_result_channel();
    let handle = sampler::start(
        cfg.clone(),
        Box::new(source),
        primary,
        secondary,
        store,
        prefixes,
        sender,
    )?;

    // Enter (or a closed stdin) ends the session
    let stop = handle.stop_flag();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        log("Stop requested");
        stop.store(true, Ordering::SeqCst);
    });
    log("Press Enter to stop");

    // Presentation layer stand-in: drains until the worker drops its sender,
    // on the stop request above or when the worker ends on its own
    for result in receiver {
        print_result(&result);
    }

    handle.stop();
    Ok(())
}

fn print_result(result: &CycleResult) {
    let plate = result
        .plate
        .as_ref()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "—".to_string());
    let region = result.region.as_deref().unwrap_or("—");

    let mut line = format!(
        "[RESULT] #{} plate={} region={} conf={:.2} ms={:.0}",
        result.cycle, plate, region, result.confidence, result.elapsed_ms
    );
    if let Some(note) = &result.note {
        line.push_str(&format!(" note=\"{}\"", note.description));
        if !note.tag.is_empty() {
            line.push_str(&format!(" tag={}", note.tag));
        }
    }
    if !result.candidates.is_empty() {
        let cands: Vec<String> = result
            .candidates
            .iter()
            .map(|c| format!("{}:{:.2}", c.text, c.confidence))
            .collect();
        line.push_str(&format!(" candidates=[{}]", cands.join(", ")));
    }

    log(&line);
}
