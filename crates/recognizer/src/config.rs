use crate::error::{RecognizerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Path to the plate detection ONNX model (YOLO export, 640x640 input)
    #[serde(default = "default_detection_model_path")]
    pub detection_model_path: String,

    /// Path to the CTC text recognition ONNX model
    #[serde(default = "default_ocr_model_path")]
    pub ocr_model_path: String,

    /// Output vocabulary of the OCR model in class order (CTC blank excluded)
    #[serde(default = "default_ocr_charset")]
    pub ocr_charset: String,

    /// Confidence threshold for plate detections (0.1 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// IoU (Intersection over Union) threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Class count of the detection head; each candidate carries `4 + num_classes` values
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,

    /// Maximum number of plates kept per frame after NMS
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,

    /// Detection model input size (width and height)
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Gray level used to pad the letterboxed frame
    #[serde(default = "default_pad_value")]
    pub pad_value: u8,

    /// Minimum OCR confidence for a plate to be accepted
    #[serde(default = "default_ocr_min_confidence")]
    pub ocr_min_confidence: f32,

    /// Horizontal crop margin as a fraction of the box width
    #[serde(default = "default_crop_margin_x")]
    pub crop_margin_x: f32,

    /// Vertical crop margin as a fraction of the box height
    #[serde(default = "default_crop_margin_y")]
    pub crop_margin_y: f32,

    /// Crops shorter than this are upscaled by an integer factor before OCR
    #[serde(default = "default_ocr_min_height")]
    pub ocr_min_height: u32,

    /// Radius of the local block used by adaptive thresholding
    #[serde(default = "default_adaptive_block_radius")]
    pub adaptive_block_radius: u32,

    /// OCR model input width
    #[serde(default = "default_ocr_input_width")]
    pub ocr_input_width: u32,

    /// OCR model input height
    #[serde(default = "default_ocr_input_height")]
    pub ocr_input_height: u32,

    /// Number of intra-operation threads per ONNX session
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_detection_model_path() -> String {
    "models/best.onnx".to_string()
}

fn default_ocr_model_path() -> String {
    "models/plate_ocr.onnx".to_string()
}

fn default_ocr_charset() -> String {
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string()
}

fn default_confidence() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_num_classes() -> usize {
    1
}

fn default_max_detections() -> usize {
    100
}

fn default_input_size() -> u32 {
    640
}

fn default_pad_value() -> u8 {
    114
}

fn default_ocr_min_confidence() -> f32 {
    0.3
}

fn default_crop_margin_x() -> f32 {
    0.10
}

fn default_crop_margin_y() -> f32 {
    0.15
}

fn default_ocr_min_height() -> u32 {
    200
}

fn default_adaptive_block_radius() -> u32 {
    5
}

fn default_ocr_input_width() -> u32 {
    200
}

fn default_ocr_input_height() -> u32 {
    64
}

fn default_intra_threads() -> usize {
    4
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            detection_model_path: default_detection_model_path(),
            ocr_model_path: default_ocr_model_path(),
            ocr_charset: default_ocr_charset(),
            confidence_threshold: default_confidence(),
            iou_threshold: default_iou_threshold(),
            num_classes: default_num_classes(),
            max_detections: default_max_detections(),
            input_size: default_input_size(),
            pad_value: default_pad_value(),
            ocr_min_confidence: default_ocr_min_confidence(),
            crop_margin_x: default_crop_margin_x(),
            crop_margin_y: default_crop_margin_y(),
            ocr_min_height: default_ocr_min_height(),
            adaptive_block_radius: default_adaptive_block_radius(),
            ocr_input_width: default_ocr_input_width(),
            ocr_input_height: default_ocr_input_height(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl RecognizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.1..=1.0).contains(&self.confidence_threshold) {
            return Err(RecognizerError::InvalidConfig(format!(
                "confidence_threshold must be within [0.1, 1.0], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(RecognizerError::InvalidConfig(format!(
                "iou_threshold must be within [0.0, 1.0], got {}",
                self.iou_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.ocr_min_confidence) {
            return Err(RecognizerError::InvalidConfig(format!(
                "ocr_min_confidence must be within [0.0, 1.0], got {}",
                self.ocr_min_confidence
            )));
        }
        if self.crop_margin_x < 0.0 || self.crop_margin_y < 0.0 {
            return Err(RecognizerError::InvalidConfig(
                "crop margins must not be negative".to_string(),
            ));
        }
        if self.input_size == 0
            || self.max_detections == 0
            || self.num_classes == 0
            || self.ocr_input_width == 0
            || self.ocr_input_height == 0
        {
            return Err(RecognizerError::InvalidConfig(
                "input sizes, num_classes and max_detections must be non-zero".to_string(),
            ));
        }
        if self.ocr_charset.is_empty() {
            return Err(RecognizerError::InvalidConfig(
                "ocr_charset must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
