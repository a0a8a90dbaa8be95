//! End-to-end tests for the detection + OCR pipeline with stand-in models

use common::{is_valid_plate, Detection};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use ndarray::{Array3, Array4, ArrayD};
use recognizer::detector::{InferenceBackend, PlateDetector};
use recognizer::ocr::{OcrRequest, TextFragment, TextRecognition, TextRecognizer};
use recognizer::reader::PlateReader;
use recognizer::{PlateRecognizer, RecognizerConfig, RecognizerError};
use std::sync::{Arc, Mutex};

/// Detector stand-in that "sees" pure white regions of the letterboxed input
/// and reports one box around them, in 640x640 space
struct WhiteRegionDetector {
    confidence: f32,
}

impl InferenceBackend for WhiteRegionDetector {
    fn run(&self, input: Array4<f32>) -> recognizer::Result<ArrayD<f32>> {
        let (height, width) = (input.shape()[2], input.shape()[3]);
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (usize::MAX, usize::MAX, 0, 0);

        for y in 0..height {
            for x in 0..width {
                let white = (0..3).all(|c| input[[0, c, y, x]] > 0.95);
                if white {
                    x_min = x_min.min(x);
                    y_min = y_min.min(y);
                    x_max = x_max.max(x + 1);
                    y_max = y_max.max(y + 1);
                }
            }
        }

        // One candidate around the white region, none on an empty frame
        let found = usize::from(x_min != usize::MAX);
        let mut output = Array3::<f32>::zeros((1, 5, found));
        if found == 1 {
            output[[0, 0, 0]] = (x_min + x_max) as f32 / 2.0;
            output[[0, 1, 0]] = (y_min + y_max) as f32 / 2.0;
            output[[0, 2, 0]] = (x_max - x_min) as f32;
            output[[0, 3, 0]] = (y_max - y_min) as f32;
            output[[0, 4, 0]] = self.confidence;
        }
        Ok(output.into_dyn())
    }
}

/// Detector stand-in replaying a fixed set of `[cx, cy, w, h, conf]` rows
struct ScriptedDetector {
    rows: Vec<[f32; 5]>,
}

impl InferenceBackend for ScriptedDetector {
    fn run(&self, _input: Array4<f32>) -> recognizer::Result<ArrayD<f32>> {
        let mut output = Array3::<f32>::zeros((1, 5, self.rows.len()));
        for (i, row) in self.rows.iter().enumerate() {
            for (a, value) in row.iter().enumerate() {
                output[[0, a, i]] = *value;
            }
        }
        Ok(output.into_dyn())
    }
}

/// OCR stand-in that reads the plate only from the binarised variants and
/// records the size of every crop it was given
struct PlateText {
    text: &'static str,
    crops: Mutex<Vec<(u32, u32)>>,
}

impl PlateText {
    fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            crops: Mutex::new(Vec::new()),
        })
    }
}

impl TextRecognizer for PlateText {
    fn recognize(&self, request: &OcrRequest<'_>) -> recognizer::Result<TextRecognition> {
        self.crops.lock().unwrap().push(request.image.dimensions());
        let binary = request.image.pixels().all(|p| p[0] == 0 || p[0] == 255);
        let confidence = if binary { 0.88 } else { 0.41 };
        Ok(TextRecognition {
            fragments: vec![TextFragment::new(self.text, confidence)],
        })
    }
}

/// 1280x720 dark frame with a white plate at (500,400)-(780,460)
fn street_scene() -> RgbImage {
    let mut image = RgbImage::from_pixel(1280, 720, Rgb([60, 60, 60]));
    draw_filled_rect_mut(
        &mut image,
        Rect::at(500, 400).of_size(280, 60),
        Rgb([255, 255, 255]),
    );
    image
}

fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}

#[test]
fn test_clear_plate_is_detected_and_read() {
    let ocr = PlateText::new("AB123CD");
    let pipeline = PlateRecognizer::new(
        RecognizerConfig::default(),
        Arc::new(WhiteRegionDetector { confidence: 0.87 }),
        ocr.clone(),
    );

    let plates = pipeline.recognize(&street_scene());
    assert_eq!(plates.len(), 1);

    let plate = &plates[0];
    assert_eq!(plate.plate, "AB123CD");
    assert!(plate.ocr_confidence >= 0.3);
    // Binarised variants win over plain grayscale
    assert_close(plate.ocr_confidence, 0.88, 1e-6);
    assert!(plate.detection_confidence >= 0.5);

    // Box mapped back to the original frame, within resize rounding
    assert_close(plate.bbox.x_min, 500.0, 3.0);
    assert_close(plate.bbox.y_min, 400.0, 3.0);
    assert_close(plate.bbox.x_max, 780.0, 3.0);
    assert_close(plate.bbox.y_max, 460.0, 3.0);

    // Every strategy saw the same margin-expanded crop
    let crops = ocr.crops.lock().unwrap();
    assert_eq!(crops.len(), 3);
    assert!(crops.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_portrait_frame_is_mapped_back() {
    let mut image = RgbImage::from_pixel(720, 1280, Rgb([30, 30, 30]));
    draw_filled_rect_mut(
        &mut image,
        Rect::at(200, 900).of_size(300, 70),
        Rgb([255, 255, 255]),
    );

    let detector = PlateDetector::new(
        Arc::new(WhiteRegionDetector { confidence: 0.9 }),
        &RecognizerConfig::default(),
    );
    let detections = detector.detect(&image, 0.5, 0.45).unwrap();

    assert_eq!(detections.len(), 1);
    let bbox = detections[0].bbox;
    assert_close(bbox.x_min, 200.0, 3.0);
    assert_close(bbox.y_min, 900.0, 3.0);
    assert_close(bbox.x_max, 500.0, 3.0);
    assert_close(bbox.y_max, 970.0, 3.0);
}

#[test]
fn test_empty_scene_has_no_plates() {
    let ocr = PlateText::new("AB123CD");
    let pipeline = PlateRecognizer::new(
        RecognizerConfig::default(),
        Arc::new(WhiteRegionDetector { confidence: 0.87 }),
        ocr.clone(),
    );

    let empty = RgbImage::from_pixel(1280, 720, Rgb([60, 60, 60]));
    let detector = PlateDetector::new(
        Arc::new(WhiteRegionDetector { confidence: 0.87 }),
        &RecognizerConfig::default(),
    );
    assert_eq!(detector.detect(&empty, 0.5, 0.45).unwrap(), vec![]);
    assert!(pipeline.recognize(&empty).is_empty());
    assert!(ocr.crops.lock().unwrap().is_empty());
}

#[test]
fn test_weak_detection_is_filtered() {
    let pipeline = PlateRecognizer::new(
        RecognizerConfig::default(),
        Arc::new(WhiteRegionDetector { confidence: 0.3 }),
        PlateText::new("AB123CD"),
    );

    assert!(pipeline.recognize(&street_scene()).is_empty());
}

#[test]
fn test_unreadable_plate_is_absent() {
    let pipeline = PlateRecognizer::new(
        RecognizerConfig::default(),
        Arc::new(WhiteRegionDetector { confidence: 0.87 }),
        PlateText::new("A8I23CD0"),
    );

    assert!(pipeline.recognize(&street_scene()).is_empty());
}

#[test]
fn test_encoded_snapshot_round_trip() {
    let pipeline = PlateRecognizer::new(
        RecognizerConfig::default(),
        Arc::new(WhiteRegionDetector { confidence: 0.87 }),
        PlateText::new("AB123CD"),
    );

    let mut jpeg = Vec::new();
    street_scene()
        .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    let plates = pipeline.recognize_encoded(&jpeg).unwrap();
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0].plate, "AB123CD");

    let err = pipeline.recognize_encoded(&jpeg[jpeg.len() / 2..]).unwrap_err();
    assert!(matches!(err, RecognizerError::Decode(_)));
}

/// Deterministic pseudo-random stream for the property checks
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

#[test]
fn test_detections_respect_threshold_bounds_and_overlap() {
    let mut rng = Lcg(42);

    for (width, height) in [(1280, 720), (720, 1280), (1920, 1080), (333, 517)] {
        // Clusters of jittered boxes, some hanging off the canvas
        let mut rows = Vec::new();
        for _ in 0..12 {
            let cx = rng.next_f32() * 700.0 - 30.0;
            let cy = rng.next_f32() * 700.0 - 30.0;
            for _ in 0..6 {
                rows.push([
                    cx + rng.next_f32() * 20.0,
                    cy + rng.next_f32() * 10.0,
                    60.0 + rng.next_f32() * 80.0,
                    20.0 + rng.next_f32() * 20.0,
                    rng.next_f32(),
                ]);
            }
        }

        let detector = PlateDetector::new(
            Arc::new(ScriptedDetector { rows }),
            &RecognizerConfig::default(),
        );
        let image = RgbImage::new(width, height);
        let detections: Vec<Detection> = detector.detect(&image, 0.5, 0.45).unwrap();

        for (i, a) in detections.iter().enumerate() {
            assert!(a.confidence >= 0.5);
            assert!(a.bbox.x_min >= 0.0 && a.bbox.y_min >= 0.0);
            assert!(a.bbox.x_max <= (width - 1) as f32);
            assert!(a.bbox.y_max <= (height - 1) as f32);
            for b in detections.iter().skip(i + 1) {
                assert!(
                    a.bbox.iou(&b.bbox) <= 0.45,
                    "{}x{}: {:?} overlaps {:?}",
                    width,
                    height,
                    a,
                    b
                );
            }
        }
    }
}

#[test]
fn test_reader_never_returns_invalid_text() {
    let image = street_scene();
    let detection = Detection {
        bbox: common::BoundingBox::new(500.0, 400.0, 780.0, 460.0),
        confidence: 0.9,
    };

    for text in ["AB123CD", "ab123cd", "AB-123-CD", "AB123C", "1B123CD", "AB1234D", ""] {
        let reader = PlateReader::new(PlateText::new(text), &RecognizerConfig::default());
        if let Some(candidate) = reader.read(&image, &detection) {
            assert!(is_valid_plate(&candidate.plate), "{:?} from {:?}", candidate, text);
            assert!(candidate.ocr_confidence >= 0.3);
        }
    }
}
