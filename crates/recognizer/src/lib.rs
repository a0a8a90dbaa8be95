//! Plate detection and recognition pipeline.
//!
//! A frame flows through two stages:
//! 1. [`detector::PlateDetector`] letterboxes the frame, runs the YOLO plate
//!    model and returns suppressed boxes in original-image coordinates.
//! 2. [`reader::PlateReader`] crops each box, runs OCR over several
//!    preprocessing strategies and keeps the most confident grammar-valid text.
//!
//! [`pipeline::PlateRecognizer`] ties both together and is what callers hold.
pub mod config;
pub mod detector;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod reader;
pub mod session;

pub use config::RecognizerConfig;
pub use error::{RecognizerError, Result};
pub use pipeline::PlateRecognizer;
