//! Image variant generation and preprocessing for the recognizers.
//!
//! A captured region from a live screen is unpredictable: letterboxed photo
//! viewers leave dark margins, small source regions need upscaling. Each
//! cycle therefore offers the recognizers an ordered series of geometric
//! variants instead of a single frame.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgba, RgbaImage};

/// Luma value at or below which a pixel counts as margin, not content.
const DARK_FLOOR: u8 = 12;

/// Skip trimming when less than this fraction of pixels is lit.
const MIN_CONTENT_FRACTION: f32 = 0.10;

/// Skip trimming when the lit bounding box covers less than this fraction of
/// the frame (a micro-crop is more likely noise than a plate).
const MIN_BOX_FRACTION: f32 = 0.30;

/// Upscale factor for the enlarged variant and the enhanced preprocessing.
const UPSCALE: u32 = 2;

/// Builds the ordered variant list for one frame: the original, the
/// dark-margin trim (only when trimming actually removed something), and a
/// 2x upscale of the trimmed frame. Never returns an empty list.
pub fn variants(frame: &RgbaImage) -> Vec<RgbaImage> {
    let mut out = vec![frame.clone()];

    let base = match trim_dark_margins(frame) {
        Some(trimmed) => {
            out.push(trimmed.clone());
            trimmed
        }
        None => frame.clone(),
    };

    out.push(upscale(&base));
    out
}

/// Integer luma approximation (Rec. 601 weights).
fn luma(px: &Rgba<u8>) -> u8 {
    let l = (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000;
    l as u8
}

/// Cuts away dark margins around the content bounding box.
///
/// Returns `None` when nothing should be trimmed: the frame is mostly dark,
/// the lit box is a micro-crop, or the box already spans the full frame.
pub fn trim_dark_margins(img: &RgbaImage) -> Option<RgbaImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let mut min_x = w;
    let mut min_y = h;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut lit: u64 = 0;

    for (x, y, px) in img.enumerate_pixels() {
        if luma(px) > DARK_FLOOR {
            lit += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    let total = w as u64 * h as u64;
    if (lit as f32) < MIN_CONTENT_FRACTION * total as f32 {
        return None;
    }

    let bw = max_x - min_x + 1;
    let bh = max_y - min_y + 1;
    if ((bw * bh) as f32) < MIN_BOX_FRACTION * total as f32 {
        return None;
    }
    if bw == w && bh == h {
        return None;
    }

    Some(imageops::crop_imm(img, min_x, min_y, bw, bh).to_image())
}

/// 2x Catmull-Rom upscale.
pub fn upscale(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    imageops::resize(img, w * UPSCALE, h * UPSCALE, FilterType::CatmullRom)
}

/// Preprocessing for the "enhanced" recognizer instance: grayscale, 2x
/// upscale, then a binary threshold that keeps light plate background white
/// and dark glyphs black.
pub fn enhance(img: &RgbaImage, threshold: u8) -> GrayImage {
    let gray = imageops::grayscale(img);
    let (w, h) = gray.dimensions();
    let scaled = imageops::resize(&gray, w * UPSCALE, h * UPSCALE, FilterType::CatmullRom);

    let mut out = GrayImage::new(scaled.width(), scaled.height());
    for (x, y, px) in scaled.enumerate_pixels() {
        let value = if px[0] > threshold { 255u8 } else { 0u8 };
        out.put_pixel(x, y, image::Luma([value]));
    }
    out
}
