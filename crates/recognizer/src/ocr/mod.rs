//! Text recognition collaborator used by the plate reader
pub mod onnx;

use crate::error::Result;
use crate::reader::preprocess::Preprocessing;
use image::GrayImage;

pub use onnx::OnnxTextRecognizer;

/// One preprocessed crop to read
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    pub image: &'a GrayImage,

    /// Characters the engine may emit
    pub allowlist: &'a str,

    /// How `image` was prepared
    pub mode: Preprocessing,
}

/// A run of text found by the engine with its confidence.
///
/// Confidence is whatever the engine reports; the reader normalises it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub confidence: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRecognition {
    pub fragments: Vec<TextFragment>,
}

impl TextRecognition {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Reads text from a grayscale crop.
///
/// Implementations are shared across threads and must not keep per-call state
/// outside their own synchronisation.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, request: &OcrRequest<'_>) -> Result<TextRecognition>;
}
