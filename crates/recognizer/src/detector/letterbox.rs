//! Aspect-preserving resize onto the detector's square input, and its inverse.

use common::BoundingBox;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::Array4;

/// Geometry of one letterbox transform.
///
/// The source is scaled by `scale` so its longer side equals `size`, then
/// placed at (`pad_x`, `pad_y`) on a `size x size` canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, size: u32) -> Self {
        let width = source_width.max(1);
        let height = source_height.max(1);
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let (scaled_width, scaled_height) = scaled_dims(width, height, scale, size);

        Self {
            size,
            scale,
            pad_x: (size - scaled_width) / 2,
            pad_y: (size - scaled_height) / 2,
            source_width: width,
            source_height: height,
        }
    }

    /// Size of the resized content inside the canvas
    pub fn scaled_size(&self) -> (u32, u32) {
        scaled_dims(self.source_width, self.source_height, self.scale, self.size)
    }

    /// Resize `image` and pad it to the square canvas
    pub fn apply(&self, image: &RgbImage, pad_value: u8) -> RgbImage {
        let (scaled_width, scaled_height) = self.scaled_size();
        let resized = imageops::resize(image, scaled_width, scaled_height, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([pad_value; 3]));
        imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);
        canvas
    }

    /// Map a box from original-image space into letterboxed space
    pub fn to_letterboxed(&self, bbox: &BoundingBox) -> BoundingBox {
        let pad_x = self.pad_x as f32;
        let pad_y = self.pad_y as f32;
        BoundingBox::new(
            bbox.x_min * self.scale + pad_x,
            bbox.y_min * self.scale + pad_y,
            bbox.x_max * self.scale + pad_x,
            bbox.y_max * self.scale + pad_y,
        )
    }

    /// Map a box from letterboxed space back to original-image pixels,
    /// clamped to the image bounds
    pub fn to_original(&self, bbox: &BoundingBox) -> BoundingBox {
        let pad_x = self.pad_x as f32;
        let pad_y = self.pad_y as f32;
        BoundingBox::new(
            (bbox.x_min - pad_x) / self.scale,
            (bbox.y_min - pad_y) / self.scale,
            (bbox.x_max - pad_x) / self.scale,
            (bbox.y_max - pad_y) / self.scale,
        )
        .clamp_to(self.source_width, self.source_height)
    }
}

fn scaled_dims(width: u32, height: u32, scale: f32, size: u32) -> (u32, u32) {
    let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, size);
    (scaled_width, scaled_height)
}

/// Convert to NCHW layout, RGB channel order, normalized to [0, 1]
pub fn to_nchw_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut input = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_geometry() {
        let lb = Letterbox::new(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.scaled_size(), (640, 360));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 140));
    }

    #[test]
    fn test_portrait_geometry() {
        let lb = Letterbox::new(480, 960, 640);
        assert_eq!(lb.scaled_size(), (320, 640));
        assert_eq!((lb.pad_x, lb.pad_y), (160, 0));
    }

    #[test]
    fn test_apply_pads_with_neutral_gray() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
        let lb = Letterbox::new(200, 100, 64);
        let out = lb.apply(&image, 114);

        assert_eq!(out.dimensions(), (64, 64));
        // Top padding band
        assert_eq!(out.get_pixel(32, 0), &Rgb([114, 114, 114]));
        // Content in the middle
        assert_eq!(out.get_pixel(32, 32), &Rgb([255, 0, 0]));
        // Bottom padding band
        assert_eq!(out.get_pixel(32, 63), &Rgb([114, 114, 114]));
    }

    #[test]
    fn test_corner_round_trip_within_one_pixel() {
        for (w, h) in [(1280, 720), (720, 1280), (333, 517), (640, 640), (3000, 200)] {
            let lb = Letterbox::new(w, h, 640);
            let (sw, sh) = lb.scaled_size();
            let content = BoundingBox::new(
                lb.pad_x as f32,
                lb.pad_y as f32,
                (lb.pad_x + sw) as f32,
                (lb.pad_y + sh) as f32,
            );

            let original = lb.to_original(&content);
            assert!(original.x_min.abs() <= 1.0, "{w}x{h}: {original:?}");
            assert!(original.y_min.abs() <= 1.0, "{w}x{h}: {original:?}");
            assert!((original.x_max - (w - 1) as f32).abs() <= 1.0, "{w}x{h}: {original:?}");
            assert!((original.y_max - (h - 1) as f32).abs() <= 1.0, "{w}x{h}: {original:?}");
        }
    }

    #[test]
    fn test_inner_box_round_trip() {
        let lb = Letterbox::new(1280, 720, 640);
        let bbox = BoundingBox::new(500.0, 400.0, 780.0, 460.0);
        let back = lb.to_original(&lb.to_letterboxed(&bbox));

        assert!((back.x_min - bbox.x_min).abs() < 1.0);
        assert!((back.y_min - bbox.y_min).abs() < 1.0);
        assert!((back.x_max - bbox.x_max).abs() < 1.0);
        assert!((back.y_max - bbox.y_max).abs() < 1.0);
    }

    #[test]
    fn test_to_original_clamps_into_image() {
        let lb = Letterbox::new(1280, 720, 640);
        // Box reaching into the padding bands
        let back = lb.to_original(&BoundingBox::new(-10.0, 0.0, 650.0, 640.0));
        assert_eq!(back, BoundingBox::new(0.0, 0.0, 1279.0, 719.0));
    }

    #[test]
    fn test_nchw_tensor_layout() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        image.put_pixel(3, 1, Rgb([255, 51, 0]));
        let tensor = to_nchw_tensor(&image);

        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert!((tensor[[0, 1, 1, 3]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 2, 1, 3]], 0.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }
}
