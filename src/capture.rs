//! Frame acquisition boundary.
//!
//! The actual screen grabber is an external collaborator; the sampling loop
//! only depends on [`FrameSource`]. The file-backed [`ImageDirSource`] stands
//! in for live capture: it picks up the newest image dropped into a watched
//! directory and crops it to the configured region.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::Region;

/// Produces one frame per sampling cycle. A failed grab degrades the cycle
/// to "no plate"; it never terminates the session.
pub trait FrameSource {
    fn grab(&mut self) -> Result<RgbaImage>;
}

/// Reads frames from image files in a directory, newest first.
pub struct ImageDirSource {
    dir: PathBuf,
    region: Region,
}

impl ImageDirSource {
    /// Fails when the directory does not exist; that is a startup error, not
    /// a per-cycle one.
    pub fn new(dir: impl Into<PathBuf>, region: Region) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(anyhow!("Frame directory not found: {}", dir.display()));
        }
        Ok(Self { dir, region })
    }

    fn newest_image(&self) -> Result<PathBuf> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if !is_image_file(&path) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let is_newer = newest
                .as_ref()
                .map(|(t, _)| modified > *t)
                .unwrap_or(true);
            if is_newer {
                newest = Some((modified, path));
            }
        }

        newest
            .map(|(_, path)| path)
            .ok_or_else(|| anyhow!("No image files in {}", self.dir.display()))
    }
}

impl FrameSource for ImageDirSource {
    fn grab(&mut self) -> Result<RgbaImage> {
        let path = self.newest_image()?;
        let img = image::open(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?
            .to_rgba8();
        crop_to_region(&img, &self.region)
    }
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp"
    )
}

/// Crops a frame to the configured screen region, clamped to the frame
/// bounds. A region entirely outside the frame is a grab failure.
fn crop_to_region(img: &RgbaImage, region: &Region) -> Result<RgbaImage> {
    let (w, h) = img.dimensions();
    if region.x >= w || region.y >= h {
        return Err(anyhow!(
            "Capture region ({}, {}) lies outside the {}x{} frame",
            region.x,
            region.y,
            w,
            h
        ));
    }

    let cw = region.width.min(w - region.x);
    let ch = region.height.min(h - region.y);
    Ok(image::imageops::crop_imm(img, region.x, region.y, cw, ch).to_image())
}
