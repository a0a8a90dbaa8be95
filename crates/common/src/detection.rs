//! Detection contracts shared by the recognizer, the hub client and the scanner.
//!
//! Boxes travel in corner form (x-min, y-min, x-max, y-max) and, once they leave
//! the detector, are always expressed in original-image pixel coordinates.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in corner form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Build a box from the center/size form emitted by YOLO-style heads
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x_min: cx - width / 2.0,
            y_min: cy - height / 2.0,
            x_max: cx + width / 2.0,
            y_max: cy + height / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Calculate Intersection over Union (IoU)
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        let intersection = if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        };

        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp every coordinate into `[0, width-1] x [0, height-1]`
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        Self {
            x_min: self.x_min.clamp(0.0, max_x),
            y_min: self.y_min.clamp(0.0, max_y),
            x_max: self.x_max.clamp(0.0, max_x),
            y_max: self.y_max.clamp(0.0, max_y),
        }
    }

    /// Integer pixel corners `[x1, y1, x2, y2]` as reported to the hub
    pub fn to_pixels(&self) -> [u32; 4] {
        [
            self.x_min.max(0.0).round() as u32,
            self.y_min.max(0.0).round() as u32,
            self.x_max.max(0.0).round() as u32,
            self.y_max.max(0.0).round() as u32,
        ]
    }
}

/// Plate-shaped region found by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box in original-image coordinates
    pub bbox: BoundingBox,

    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,
}

/// A validated plate read from one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateCandidate {
    /// Plate text, always matching the plate grammar (e.g. "AB123CD")
    pub plate: String,

    /// OCR confidence (0.0 to 1.0)
    pub ocr_confidence: f32,

    /// Confidence of the detection the plate was read from (0.0 to 1.0)
    pub detection_confidence: f32,

    /// Source detection box
    pub bbox: BoundingBox,
}
