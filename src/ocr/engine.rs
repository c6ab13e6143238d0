//! Tesseract-backed recognizer.
//!
//! Shells out to the Tesseract CLI with TSV output and turns the word rows
//! into ranked plate candidates. The "enhanced" instance runs the frame
//! through [`preprocess::enhance`] first; the "raw" instance feeds the frame
//! in untouched and acts as the fallback configuration.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess;
use super::recognizer::{Candidate, Reading, Recognizer};
use crate::plate::{self, Plate};

/// Plates only ever contain these characters; restricting the engine cuts
/// down on punctuation noise.
const CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Confidence penalty for candidates that pass the shape filters but miss
/// the plate pattern. They stay visible to the correction step, just ranked
/// lower.
const PATTERN_MISS_PENALTY: f32 = 0.7;

/// How many candidates a reading carries.
const MAX_CANDIDATES: usize = 5;

/// A line of recognized text with its mean word confidence (0-100).
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
}

/// One of the two recognizer configurations.
pub struct TesseractRecognizer {
    command: String,
    enhance: bool,
    threshold: u8,
}

impl TesseractRecognizer {
    /// The preprocessing configuration: grayscale, upscale, binarize.
    pub fn enhanced(command: &str, threshold: u8) -> Self {
        Self {
            command: command.to_string(),
            enhance: true,
            threshold,
        }
    }

    /// The passthrough configuration.
    pub fn raw(command: &str) -> Self {
        Self {
            command: command.to_string(),
            enhance: false,
            threshold: 0,
        }
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, img: &RgbaImage) -> Result<Reading> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        if self.enhance {
            preprocess::enhance(img, self.threshold)
                .save(temp_input.path())
                .context("Failed to save preprocessed frame")?;
        } else {
            img.save(temp_input.path())
                .context("Failed to save frame")?;
        }

        let lines = run_tesseract(&self.command, temp_input.path())?;
        Ok(reading_from_lines(&lines))
    }
}

/// Runs Tesseract on an image file and parses its TSV output.
fn run_tesseract(command: &str, input: &Path) -> Result<Vec<OcrLine>> {
    // Tesseract appends .tsv to the output base itself
    let temp_output = NamedTempFile::new()?;
    let output_base = temp_output.path().to_string_lossy().to_string();

    let output = Command::new(command)
        .arg(input)
        .arg(&output_base)
        .arg("-l")
        .arg("eng")
        .arg("--psm")
        .arg("7") // Treat the image as a single text line
        .arg("-c")
        .arg(format!("tessedit_char_whitelist={}", CHAR_WHITELIST))
        .arg("tsv")
        .output()
        .with_context(|| format!("Failed to launch `{}`", command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Tesseract failed: {}", stderr));
    }

    let tsv_path = format!("{}.tsv", output_base);
    let tsv_content = std::fs::read_to_string(&tsv_path)
        .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
    let _ = std::fs::remove_file(&tsv_path);

    parse_tsv_output(&tsv_content)
}

/// Parses Tesseract TSV word rows into per-line text with mean confidence.
pub fn parse_tsv_output(tsv: &str) -> Result<Vec<OcrLine>> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_line_num: i32 = -1;
    let mut current_text = String::new();
    let mut current_conf_sum: f32 = 0.0;
    let mut current_word_count: usize = 0;

    let mut flush = |text: &mut String, conf_sum: &mut f32, count: &mut usize| {
        if *count > 0 {
            lines.push(OcrLine {
                text: std::mem::take(text),
                confidence: *conf_sum / *count as f32,
            });
        } else {
            text.clear();
        }
        *conf_sum = 0.0;
        *count = 0;
    };

    for line in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let line_num: i32 = fields[4].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() {
            continue;
        }

        if line_num != current_line_num && current_line_num >= 0 {
            flush(&mut current_text, &mut current_conf_sum, &mut current_word_count);
        }
        current_line_num = line_num;

        if conf >= 0.0 {
            if !current_text.is_empty() {
                current_text.push(' ');
            }
            current_text.push_str(text);
            current_conf_sum += conf;
            current_word_count += 1;
        }
    }

    flush(&mut current_text, &mut current_conf_sum, &mut current_word_count);

    Ok(lines)
}

/// Shapes OCR lines into a [`Reading`].
///
/// Only plate-shaped lines survive: 6-8 normalized characters, leading
/// letter, at least one digit. Lines that miss the full pattern are kept as
/// penalized candidates so the correction step can still see them. The best
/// surviving candidate becomes the reading's raw plate and confidence.
pub fn reading_from_lines(lines: &[OcrLine]) -> Reading {
    let mut candidates: Vec<Candidate> = Vec::new();

    for line in lines {
        let norm = plate::normalize(&line.text);
        if norm.len() < 6 || norm.len() > 8 {
            continue;
        }
        if !norm.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        if !norm.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }

        // Tesseract confidences are 0-100
        let mut score = line.confidence / 100.0;
        if Plate::parse(&norm).is_none() {
            score *= PATTERN_MISS_PENALTY;
        }
        candidates.push(Candidate::new(norm, score));
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(MAX_CANDIDATES);

    let (plate, confidence) = match candidates.first() {
        Some(best) => (Some(best.text.clone()), best.confidence),
        None => (None, 0.0),
    };

    Reading {
        plate,
        confidence,
        candidates,
    }
}
