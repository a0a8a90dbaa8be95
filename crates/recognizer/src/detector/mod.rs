//! Plate detector: YOLO model over a letterboxed frame
pub mod letterbox;
pub mod postprocess;

use crate::config::RecognizerConfig;
use crate::error::Result;
use crate::session;
use common::Detection;
use image::RgbImage;
use letterbox::Letterbox;
use ndarray::{Array4, ArrayD};
use ort::session::Session;
use std::sync::{Arc, Mutex};

/// Forward pass of a detection model: `[1, 3, S, S]` in, raw head out
pub trait InferenceBackend: Send + Sync {
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>>;
}

/// ONNX Runtime backed inference
pub struct OrtBackend {
    session: Mutex<Session>,
    output_name: String,
}

impl OrtBackend {
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self> {
        let session = session::create_session(model_path, intra_threads)?;
        let output_name = session::first_output_name(&session);

        tracing::info!(
            model = %model_path,
            output = %output_name,
            "Initialized plate detection model"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        session::run_single(&self.session, &self.output_name, input)
    }
}

pub struct PlateDetector {
    backend: Arc<dyn InferenceBackend>,
    input_size: u32,
    pad_value: u8,
    num_classes: usize,
    max_detections: usize,
}

impl PlateDetector {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &RecognizerConfig) -> Self {
        Self {
            backend,
            input_size: config.input_size,
            pad_value: config.pad_value,
            num_classes: config.num_classes,
            max_detections: config.max_detections,
        }
    }

    /// Load the detection model named by the config
    pub fn from_config(config: &RecognizerConfig) -> Result<Self> {
        let backend = OrtBackend::load(&config.detection_model_path, config.intra_threads)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Locate plate regions in `image`.
    ///
    /// Every returned detection has `confidence >= confidence_threshold`, lies
    /// inside the image, and overlaps no other returned detection by more than
    /// `iou_threshold`. An empty result is a normal outcome.
    pub fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let geometry = Letterbox::new(width, height, self.input_size);

        let letterboxed = geometry.apply(image, self.pad_value);
        let input = letterbox::to_nchw_tensor(&letterboxed);

        let inference_start = std::time::Instant::now();
        let output = self.backend.run(input)?;
        telemetry::metrics::RECOGNIZER_STAGE_LATENCY
            .with_label_values(&["detect"])
            .observe(inference_start.elapsed().as_secs_f64());

        let raw = postprocess::decode_output(&output, self.num_classes, confidence_threshold)?;
        let raw_count = raw.len();

        // Suppress in image space so clamping cannot re-introduce overlap
        let candidates: Vec<Detection> = raw
            .into_iter()
            .map(|d| Detection {
                bbox: geometry.to_original(&d.bbox),
                confidence: d.confidence,
            })
            .filter(|d| d.bbox.width() > 0.0 && d.bbox.height() > 0.0)
            .collect();

        let mut detections = postprocess::nms(candidates, iou_threshold);
        detections.truncate(self.max_detections);

        tracing::debug!(
            width,
            height,
            candidates = raw_count,
            kept = detections.len(),
            "Plate detection finished"
        );

        Ok(detections)
    }
}
