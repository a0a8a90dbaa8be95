//! Decoding of the raw YOLO head and Non-Maximum Suppression.

use crate::error::{RecognizerError, Result};
use common::{BoundingBox, Detection};
use ndarray::{ArrayD, Axis};
use std::cmp::Ordering;

/// Decode raw detector output into corner-form candidates in letterboxed space.
///
/// Accepts `[1, 4 + num_classes, N]` (the YOLOv8 export) or its transpose
/// `[1, N, 4 + num_classes]`. The attribute axis is the one whose length is
/// `4 + num_classes`, checked on axis 1 first, so any candidate count
/// (including 0) decodes. A candidate's confidence is its best class score.
/// Candidates below `confidence_threshold` are dropped.
pub fn decode_output(
    output: &ArrayD<f32>,
    num_classes: usize,
    confidence_threshold: f32,
) -> Result<Vec<Detection>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] < 1 {
        return Err(RecognizerError::UnexpectedOutput(format!(
            "expected [1, attributes, candidates], got {:?}",
            shape
        )));
    }

    let num_attributes = 4 + num_classes;
    let batch = output.index_axis(Axis(0), 0);
    // Orient as [attributes, candidates]
    let predictions = if shape[1] == num_attributes {
        batch
    } else if shape[2] == num_attributes {
        batch.reversed_axes()
    } else {
        return Err(RecognizerError::UnexpectedOutput(format!(
            "no axis of {:?} holds {} attributes ({} classes)",
            shape, num_attributes, num_classes
        )));
    };

    let num_candidates = predictions.shape()[1];
    let mut candidates = Vec::new();

    for i in 0..num_candidates {
        // Best class score; single-class models have exactly one
        let confidence = (4..num_attributes)
            .map(|c| predictions[[c, i]])
            .fold(f32::NEG_INFINITY, f32::max);

        if confidence.is_nan() || confidence < confidence_threshold {
            continue;
        }

        let cx = predictions[[0, i]];
        let cy = predictions[[1, i]];
        let w = predictions[[2, i]];
        let h = predictions[[3, i]];

        candidates.push(Detection {
            bbox: BoundingBox::from_center(cx, cy, w, h),
            confidence,
        });
    }

    Ok(candidates)
}

/// Greedy Non-Maximum Suppression.
///
/// Candidates are visited by descending confidence (stable, so equal scores
/// keep their original order); a candidate is dropped when its IoU with an
/// already kept box exceeds `iou_threshold`.
pub fn nms(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();

    for candidate in candidates {
        let suppressed = keep
            .iter()
            .any(|kept| kept.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }

    keep
}
