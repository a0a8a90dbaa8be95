//! Plate reader: OCR over several preprocessing strategies, arbitrated by confidence
pub mod preprocess;

use crate::config::RecognizerConfig;
use crate::ocr::{OcrRequest, TextRecognition, TextRecognizer};
use common::{
    is_valid_plate, normalize_confidence, normalize_plate_text, Detection, PlateCandidate,
    OCR_ALLOWLIST,
};
use image::{imageops, RgbImage};
use preprocess::Preprocessing;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use telemetry::metrics::RECOGNIZER_OCR_VARIANTS;

pub struct PlateReader {
    recognizer: Arc<dyn TextRecognizer>,
    min_confidence: f32,
    margin_x: f32,
    margin_y: f32,
    min_height: u32,
    block_radius: u32,
}

impl PlateReader {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: &RecognizerConfig) -> Self {
        Self {
            recognizer,
            min_confidence: config.ocr_min_confidence,
            margin_x: config.crop_margin_x,
            margin_y: config.crop_margin_y,
            min_height: config.ocr_min_height,
            block_radius: config.adaptive_block_radius,
        }
    }

    /// Read the plate inside `detection`.
    ///
    /// Every strategy in [`Preprocessing::ALL`] is tried; the most confident
    /// grammar-valid text wins and ties keep the earlier strategy. OCR errors
    /// and panics only cost the strategy they happen in. `None` when nothing
    /// valid was read.
    pub fn read(&self, image: &RgbImage, detection: &Detection) -> Option<PlateCandidate> {
        let Some(crop) =
            preprocess::crop_with_margin(image, &detection.bbox, self.margin_x, self.margin_y)
        else {
            tracing::debug!(bbox = ?detection.bbox, "Empty plate crop, skipping OCR");
            return None;
        };

        let crop = preprocess::upscale_for_ocr(crop, self.min_height);
        let gray = imageops::grayscale(&crop);

        let mut best: Option<(String, f32)> = None;

        for mode in Preprocessing::ALL {
            let prepared = mode.apply(&gray, self.block_radius);
            let request = OcrRequest {
                image: &prepared,
                allowlist: OCR_ALLOWLIST,
                mode,
            };

            let Some(recognition) = self.recognize_contained(&request) else {
                continue;
            };

            for (text, confidence) in plate_texts(&recognition) {
                if !is_valid_plate(&text) || confidence < self.min_confidence {
                    continue;
                }
                let better = match &best {
                    Some((_, best_confidence)) => confidence > *best_confidence,
                    None => true,
                };
                if better {
                    tracing::debug!(
                        strategy = mode.name(),
                        plate = %text,
                        confidence,
                        "New best plate reading"
                    );
                    best = Some((text, confidence));
                }
            }
        }

        best.map(|(plate, ocr_confidence)| PlateCandidate {
            plate,
            ocr_confidence,
            detection_confidence: detection.confidence,
            bbox: detection.bbox,
        })
    }

    /// Run the recogniser, turning both errors and panics into a skipped variant
    fn recognize_contained(&self, request: &OcrRequest<'_>) -> Option<TextRecognition> {
        let strategy = request.mode.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.recognizer.recognize(request)));

        match outcome {
            Ok(Ok(recognition)) => {
                RECOGNIZER_OCR_VARIANTS
                    .with_label_values(&[strategy, "ok"])
                    .inc();
                Some(recognition)
            }
            Ok(Err(e)) => {
                tracing::warn!(strategy, error = %e, "OCR failed, skipping strategy");
                RECOGNIZER_OCR_VARIANTS
                    .with_label_values(&[strategy, "error"])
                    .inc();
                None
            }
            Err(_) => {
                tracing::warn!(strategy, "OCR panicked, skipping strategy");
                RECOGNIZER_OCR_VARIANTS
                    .with_label_values(&[strategy, "panic"])
                    .inc();
                None
            }
        }
    }
}

/// Texts to validate from one recognition: all fragments joined (mean
/// confidence) first, then every fragment on its own
fn plate_texts(recognition: &TextRecognition) -> Vec<(String, f32)> {
    let fragments: Vec<(String, f32)> = recognition
        .fragments
        .iter()
        .map(|f| (normalize_plate_text(&f.text), normalize_confidence(f.confidence)))
        .collect();

    if fragments.is_empty() {
        return Vec::new();
    }

    let joined: String = fragments.iter().map(|(text, _)| text.as_str()).collect();
    let mean = fragments.iter().map(|(_, c)| c).sum::<f32>() / fragments.len() as f32;

    let mut texts = Vec::with_capacity(fragments.len() + 1);
    texts.push((joined, mean));
    texts.extend(fragments);
    texts
}
