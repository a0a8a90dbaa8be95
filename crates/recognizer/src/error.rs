use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecognizerError>;

#[derive(Debug, Error)]
pub enum RecognizerError {
    /// The frame bytes are not a decodable image
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// A model could not be loaded; fatal at startup
    #[error("failed to load model {}: {message}", .path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("inference session lock poisoned")]
    SessionPoisoned,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// OCR failed on a single crop; the reader contains these
    #[error("ocr failed: {0}")]
    Ocr(String),
}

impl RecognizerError {
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
