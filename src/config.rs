//! Runtime configuration.
//!
//! Loads settings from config.json next to the executable at startup, falling
//! back to defaults field by field. The capture region is the only setting
//! without a usable default on every setup, so it is validated before the
//! sampling loop is allowed to start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<WatchConfig> = OnceLock::new();

/// A screen-space rectangle in absolute pixels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 640,
            height: 360,
        }
    }
}

impl Region {
    /// A degenerate region cannot start a session; this is the one fatal
    /// startup check.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "Invalid capture region: {}x{} at ({}, {})",
                self.width,
                self.height,
                self.x,
                self.y
            ));
        }
        Ok(())
    }
}

/// Complete watcher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Screen region to sample
    #[serde(default)]
    pub region: Region,
    /// Target interval between cycle starts (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Minimum sleep between cycles when a cycle overruns the interval
    #[serde(default = "default_min_sleep_ms")]
    pub min_sleep_ms: u64,
    /// How long a lost plate keeps being reported (milliseconds)
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    /// Try the preprocessing recognizer first (recommended)
    #[serde(default = "default_prefer_enhanced")]
    pub prefer_enhanced: bool,
    /// Binarization threshold for the enhanced recognizer
    #[serde(default = "default_enhance_threshold")]
    pub enhance_threshold: u8,
    /// Directory watched for incoming frames, relative to the executable
    #[serde(default = "default_frames_dir")]
    pub frames_dir: String,
    /// Tesseract command to invoke
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,
}

fn default_interval_ms() -> u64 {
    400
}

fn default_min_sleep_ms() -> u64 {
    10
}

fn default_hold_ms() -> u64 {
    crate::sampler::DEFAULT_HOLD_MS
}

fn default_prefer_enhanced() -> bool {
    true
}

fn default_enhance_threshold() -> u8 {
    110
}

fn default_frames_dir() -> String {
    "frames".to_string()
}

fn default_tesseract_cmd() -> String {
    "tesseract".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            interval_ms: default_interval_ms(),
            min_sleep_ms: default_min_sleep_ms(),
            hold_ms: default_hold_ms(),
            prefer_enhanced: default_prefer_enhanced(),
            enhance_threshold: default_enhance_threshold(),
            frames_dir: default_frames_dir(),
            tesseract_cmd: default_tesseract_cmd(),
        }
    }
}

/// Loads configuration from config.json or returns defaults.
/// Looks for config.json in the same directory as the executable.
fn load_config() -> WatchConfig {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf());

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    WatchConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static WatchConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
