//! Crop preparation and the binarisation strategies tried before OCR.

use common::BoundingBox;
use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use imageproc::contrast::{adaptive_threshold, otsu_level, threshold, ThresholdType};

/// Preprocessing applied to the grayscale crop before it is handed to OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preprocessing {
    /// Global binarisation at the Otsu level
    Otsu,
    /// Local mean binarisation over a square block
    Adaptive,
    /// Plain grayscale, no binarisation
    Grayscale,
}

impl Preprocessing {
    /// Strategies in the order they are tried
    pub const ALL: [Preprocessing; 3] = [
        Preprocessing::Otsu,
        Preprocessing::Adaptive,
        Preprocessing::Grayscale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preprocessing::Otsu => "otsu",
            Preprocessing::Adaptive => "adaptive",
            Preprocessing::Grayscale => "grayscale",
        }
    }

    pub fn apply(&self, gray: &GrayImage, block_radius: u32) -> GrayImage {
        match self {
            Preprocessing::Otsu => {
                let level = otsu_level(gray);
                threshold(gray, level, ThresholdType::Binary)
            }
            Preprocessing::Adaptive => adaptive_threshold(gray, block_radius),
            Preprocessing::Grayscale => gray.clone(),
        }
    }
}

/// Crop `bbox` out of `image`, widened by a fraction of its size on each side
/// and clipped to the image. Returns `None` for an empty region.
pub fn crop_with_margin(
    image: &RgbImage,
    bbox: &BoundingBox,
    margin_x: f32,
    margin_y: f32,
) -> Option<RgbImage> {
    let (width, height) = image.dimensions();
    let [x1, y1, x2, y2] = bbox.to_pixels();

    let mx = (x2.saturating_sub(x1) as f32 * margin_x) as u32;
    let my = (y2.saturating_sub(y1) as f32 * margin_y) as u32;

    let left = x1.saturating_sub(mx);
    let top = y1.saturating_sub(my);
    let right = x2.saturating_add(mx).min(width);
    let bottom = y2.saturating_add(my).min(height);

    if right <= left || bottom <= top {
        return None;
    }

    Some(imageops::crop_imm(image, left, top, right - left, bottom - top).to_image())
}

/// Widest crop the upscaler will produce
pub const MAX_OCR_WIDTH: u32 = 4096;

/// Upscale short crops by the integer factor `min_height / height` (bicubic).
///
/// The factor is lowered so the result is never wider than [`MAX_OCR_WIDTH`];
/// thin sliver detections along a frame edge stay small.
pub fn upscale_for_ocr(crop: RgbImage, min_height: u32) -> RgbImage {
    let (width, height) = crop.dimensions();
    if height == 0 || width == 0 {
        return crop;
    }

    let width_limit = (MAX_OCR_WIDTH / width).max(1);
    let factor = (min_height / height).min(width_limit).max(1);
    if factor == 1 {
        return crop;
    }

    imageops::resize(&crop, width * factor, height * factor, FilterType::CatmullRom)
}
