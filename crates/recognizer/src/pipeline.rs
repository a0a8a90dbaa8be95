use crate::config::RecognizerConfig;
use crate::detector::{InferenceBackend, OrtBackend, PlateDetector};
use crate::error::Result;
use crate::ocr::{OnnxTextRecognizer, TextRecognizer};
use crate::reader::PlateReader;
use common::PlateCandidate;
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics::{
    RECOGNIZER_DETECTIONS, RECOGNIZER_FRAMES, RECOGNIZER_PLATES, RECOGNIZER_STAGE_LATENCY,
};

/// Detector and reader behind one call.
///
/// Models are loaded once; the recogniser is `Send + Sync` and meant to be
/// shared behind an `Arc` by every caller.
pub struct PlateRecognizer {
    config: RecognizerConfig,
    detector: PlateDetector,
    reader: PlateReader,
}

impl PlateRecognizer {
    /// Validate `config` and load both ONNX models. Any failure is fatal.
    pub fn from_config(config: RecognizerConfig) -> Result<Self> {
        config.validate()?;

        let backend = OrtBackend::load(&config.detection_model_path, config.intra_threads)?;
        let recognizer = OnnxTextRecognizer::from_config(&config)?;

        Ok(Self::new(config, Arc::new(backend), Arc::new(recognizer)))
    }

    pub fn new(
        config: RecognizerConfig,
        backend: Arc<dyn InferenceBackend>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let detector = PlateDetector::new(backend, &config);
        let reader = PlateReader::new(recognizer, &config);
        Self {
            config,
            detector,
            reader,
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// All grammar-valid plates in `image`, in detection order.
    ///
    /// Detection failures are logged and yield no plates.
    pub fn recognize(&self, image: &RgbImage) -> Vec<PlateCandidate> {
        let start = Instant::now();

        let detections = match self.detector.detect(
            image,
            self.config.confidence_threshold,
            self.config.iou_threshold,
        ) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::error!(error = %e, "Plate detection failed");
                RECOGNIZER_FRAMES.with_label_values(&["error"]).inc();
                return Vec::new();
            }
        };
        RECOGNIZER_DETECTIONS.inc_by(detections.len() as u64);

        let ocr_start = Instant::now();
        let mut plates = Vec::new();
        for detection in &detections {
            if let Some(candidate) = self.reader.read(image, detection) {
                tracing::info!(
                    plate = %candidate.plate,
                    ocr_confidence = %format!("{:.1}%", candidate.ocr_confidence * 100.0),
                    detection_confidence = %format!("{:.1}%", candidate.detection_confidence * 100.0),
                    "Plate recognized"
                );
                RECOGNIZER_PLATES.inc();
                plates.push(candidate);
            }
        }

        RECOGNIZER_STAGE_LATENCY
            .with_label_values(&["ocr"])
            .observe(ocr_start.elapsed().as_secs_f64());
        RECOGNIZER_STAGE_LATENCY
            .with_label_values(&["total"])
            .observe(start.elapsed().as_secs_f64());
        RECOGNIZER_FRAMES.with_label_values(&["ok"]).inc();

        tracing::debug!(
            detections = detections.len(),
            plates = plates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Frame processed"
        );

        plates
    }

    /// Decode an encoded image (JPEG, PNG, ...) and recognise it.
    ///
    /// Undecodable input is the only error.
    pub fn recognize_encoded(&self, bytes: &[u8]) -> Result<Vec<PlateCandidate>> {
        let image = match image::load_from_memory(bytes) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                RECOGNIZER_FRAMES.with_label_values(&["decode_error"]).inc();
                return Err(e.into());
            }
        };

        Ok(self.recognize(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognizerError;
    use crate::ocr::{OcrRequest, TextFragment, TextRecognition};
    use image::Rgb;
    use ndarray::{Array3, Array4, ArrayD};

    /// Two plates in letterboxed space of a 1280x720 frame
    struct TwoPlates;

    impl InferenceBackend for TwoPlates {
        fn run(&self, _input: Array4<f32>) -> Result<ArrayD<f32>> {
            let rows = [
                [320.0, 355.0, 140.0, 30.0, 0.9],
                [100.0, 450.0, 100.0, 24.0, 0.6],
            ];
            let mut output = Array3::<f32>::zeros((1, 5, rows.len()));
            for (i, row) in rows.iter().enumerate() {
                for (a, value) in row.iter().enumerate() {
                    output[[0, a, i]] = *value;
                }
            }
            Ok(output.into_dyn())
        }
    }

    struct BrokenBackend;

    impl InferenceBackend for BrokenBackend {
        fn run(&self, _input: Array4<f32>) -> Result<ArrayD<f32>> {
            Err(RecognizerError::UnexpectedOutput("no output".to_string()))
        }
    }

    /// Reads a valid plate only from wide crops
    struct WideCropReader;

    impl TextRecognizer for WideCropReader {
        fn recognize(&self, request: &OcrRequest<'_>) -> Result<TextRecognition> {
            let (width, height) = request.image.dimensions();
            let text = if width > height * 4 { "AB123CD" } else { "??" };
            Ok(TextRecognition {
                fragments: vec![TextFragment::new(text, 0.77)],
            })
        }
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(1280, 720, Rgb([90, 90, 90]))
    }

    #[test]
    fn test_recognize_returns_valid_plates_only() {
        let recognizer = PlateRecognizer::new(
            RecognizerConfig::default(),
            Arc::new(TwoPlates),
            Arc::new(WideCropReader),
        );

        let plates = recognizer.recognize(&frame());
        assert_eq!(plates.len(), 1);
        assert_eq!(plates[0].plate, "AB123CD");
        assert_eq!(plates[0].detection_confidence, 0.9);
        assert!((plates[0].ocr_confidence - 0.77).abs() < 1e-6);
    }

    #[test]
    fn test_detection_failure_yields_no_plates() {
        let recognizer = PlateRecognizer::new(
            RecognizerConfig::default(),
            Arc::new(BrokenBackend),
            Arc::new(WideCropReader),
        );

        assert!(recognizer.recognize(&frame()).is_empty());
    }

    #[test]
    fn test_confidence_threshold_comes_from_config() {
        let config = RecognizerConfig {
            confidence_threshold: 0.95,
            ..Default::default()
        };
        let recognizer = PlateRecognizer::new(config, Arc::new(TwoPlates), Arc::new(WideCropReader));

        assert!(recognizer.recognize(&frame()).is_empty());
    }

    #[test]
    fn test_recognize_encoded_rejects_garbage() {
        let recognizer = PlateRecognizer::new(
            RecognizerConfig::default(),
            Arc::new(TwoPlates),
            Arc::new(WideCropReader),
        );

        let err = recognizer.recognize_encoded(b"not an image").unwrap_err();
        assert!(err.is_decode());
        assert!(recognizer.recognize_encoded(&[]).unwrap_err().is_decode());
    }

    #[test]
    fn test_recognize_encoded_png() {
        let recognizer = PlateRecognizer::new(
            RecognizerConfig::default(),
            Arc::new(TwoPlates),
            Arc::new(WideCropReader),
        );

        let mut bytes = Vec::new();
        frame()
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let plates = recognizer.recognize_encoded(&bytes).unwrap();
        assert_eq!(plates.len(), 1);
    }

    #[test]
    fn test_from_config_validates_first() {
        let config = RecognizerConfig {
            iou_threshold: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            PlateRecognizer::from_config(config),
            Err(RecognizerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_config_requires_models() {
        let config = RecognizerConfig {
            detection_model_path: "models/nope.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PlateRecognizer::from_config(config),
            Err(RecognizerError::ModelLoad { .. })
        ));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_recognizer_is_shareable() {
        assert_send_sync::<PlateRecognizer>();
    }
}
