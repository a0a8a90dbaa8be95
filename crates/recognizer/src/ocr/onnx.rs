//! CRNN/CTC plate text recogniser on ONNX Runtime.

use super::{OcrRequest, TextFragment, TextRecognition, TextRecognizer};
use crate::config::RecognizerConfig;
use crate::error::{RecognizerError, Result};
use crate::session;
use image::{imageops, imageops::FilterType, GrayImage};
use ndarray::{Array4, ArrayD, ArrayView2, Axis};
use ort::session::Session;
use std::sync::Mutex;

pub struct OnnxTextRecognizer {
    session: Mutex<Session>,
    output_name: String,
    /// Model vocabulary; class `i + 1` is `charset[i]`, class 0 is the CTC blank
    charset: Vec<char>,
    input_width: u32,
    input_height: u32,
}

impl OnnxTextRecognizer {
    pub fn from_config(config: &RecognizerConfig) -> Result<Self> {
        let session = session::create_session(&config.ocr_model_path, config.intra_threads)?;
        let output_name = session::first_output_name(&session);

        tracing::info!(
            model = %config.ocr_model_path,
            output = %output_name,
            vocab = config.ocr_charset.len(),
            "Initialized plate OCR model"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            charset: config.ocr_charset.chars().collect(),
            input_width: config.ocr_input_width,
            input_height: config.ocr_input_height,
        })
    }

    fn preprocess(&self, image: &GrayImage) -> Array4<f32> {
        let width = self.input_width;
        let height = self.input_height;
        let resized = imageops::resize(image, width, height, FilterType::Triangle);

        // NCHW, single channel, normalized to [0, 1]
        let mut input = Array4::zeros((1, 1, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        }

        input
    }
}

impl TextRecognizer for OnnxTextRecognizer {
    fn recognize(&self, request: &OcrRequest<'_>) -> Result<TextRecognition> {
        let (width, height) = request.image.dimensions();
        if width == 0 || height == 0 {
            return Ok(TextRecognition::empty());
        }

        let input = self.preprocess(request.image);
        let output = session::run_single(&self.session, &self.output_name, input)?;

        let steps = timestep_view(&output)?;
        if steps.shape()[1] != self.charset.len() + 1 {
            return Err(RecognizerError::UnexpectedOutput(format!(
                "ocr output has {} classes, vocabulary needs {}",
                steps.shape()[1],
                self.charset.len() + 1
            )));
        }

        let (text, confidence) = ctc_decode(steps, &self.charset, request.allowlist);
        if text.is_empty() {
            return Ok(TextRecognition::empty());
        }

        Ok(TextRecognition {
            fragments: vec![TextFragment::new(text, confidence)],
        })
    }
}

/// View the OCR head as `[timesteps, classes]`.
///
/// Accepts `[1, T, C]`, `[T, 1, C]` and `[T, C]`.
fn timestep_view(output: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>> {
    let shape = output.shape().to_vec();
    let view = match shape.as_slice() {
        [1, _, _] => output.index_axis(Axis(0), 0),
        [_, 1, _] => output.index_axis(Axis(1), 0),
        [_, _] => output.view(),
        _ => {
            return Err(RecognizerError::UnexpectedOutput(format!(
                "expected [1, timesteps, classes], got {:?}",
                shape
            )))
        }
    };

    Ok(view.into_dimensionality()?)
}

/// Greedy CTC decoding restricted to the allow-list.
///
/// Class 0 is the blank. Repeats collapse unless separated by a blank. The
/// returned confidence is the mean probability of the emitted characters.
pub fn ctc_decode(steps: ArrayView2<'_, f32>, charset: &[char], allowlist: &str) -> (String, f32) {
    let allowed: Vec<bool> = std::iter::once(true)
        .chain(charset.iter().map(|c| allowlist.contains(*c)))
        .collect();

    let mut text = String::new();
    let mut probabilities = Vec::new();
    let mut prev_idx = 0;

    for row in steps.outer_iter() {
        let probs = as_distribution(row.to_vec());

        // Best allowed class at this timestep
        let mut max_idx = 0;
        let mut max_prob = probs.first().copied().unwrap_or(0.0);
        for (idx, &prob) in probs.iter().enumerate().skip(1) {
            if allowed.get(idx).copied().unwrap_or(false) && prob > max_prob {
                max_prob = prob;
                max_idx = idx;
            }
        }

        // Skip blanks and repeated characters
        if max_idx > 0 && max_idx != prev_idx {
            if let Some(ch) = charset.get(max_idx - 1) {
                text.push(*ch);
                probabilities.push(max_prob);
            }
        }

        prev_idx = max_idx;
    }

    let confidence = if probabilities.is_empty() {
        0.0
    } else {
        probabilities.iter().sum::<f32>() / probabilities.len() as f32
    };

    (text, confidence)
}

/// Softmax a row unless it already is a probability distribution
fn as_distribution(row: Vec<f32>) -> Vec<f32> {
    let sum: f32 = row.iter().sum();
    let in_range = row.iter().all(|p| (0.0..=1.0).contains(p));
    if in_range && (sum - 1.0).abs() < 1e-3 {
        return row;
    }

    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    if total > 0.0 && total.is_finite() {
        exps.into_iter().map(|e| e / total).collect()
    } else {
        vec![0.0; row.len()]
    }
}
