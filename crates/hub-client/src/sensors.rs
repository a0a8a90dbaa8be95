//! Entities and events published to the hub, and their attribute payloads.

use common::PlateCandidate;
use serde_json::{json, Value};

/// Last plate read, whatever it was
pub const LAST_PLATE_SENSOR: &str = "sensor.ai_targhe_last_plate";

/// `on` while a target plate was seen within the hold time
pub const TARGET_SENSOR: &str = "binary_sensor.ai_targhe_target_detected";

/// Fired for every plate read
pub const PLATE_DETECTED_EVENT: &str = "ai_targhe_plate_detected";

const LAST_PLATE_NAME: &str = "AI Targhe - Ultima Targa";
const TARGET_NAME: &str = "AI Targhe - Targa Autorizzata";

/// Confidence as a percentage with one decimal
pub fn confidence_percent(confidence: f32) -> f64 {
    (confidence as f64 * 1000.0).round() / 10.0
}

pub fn last_plate_initial() -> Value {
    json!({
        "friendly_name": LAST_PLATE_NAME,
        "icon": "mdi:car",
    })
}

pub fn last_plate_attributes(candidate: &PlateCandidate, is_target: bool, last_seen: &str) -> Value {
    json!({
        "friendly_name": LAST_PLATE_NAME,
        "confidence": confidence_percent(candidate.ocr_confidence),
        "detection_confidence": confidence_percent(candidate.detection_confidence),
        "is_target": is_target,
        "icon": "mdi:car",
        "last_seen": last_seen,
    })
}

pub fn target_on_attributes(plate: &str) -> Value {
    json!({
        "friendly_name": TARGET_NAME,
        "device_class": "occupancy",
        "plate": plate,
        "icon": "mdi:car-connected",
    })
}

pub fn target_off_attributes() -> Value {
    json!({
        "friendly_name": TARGET_NAME,
        "device_class": "occupancy",
        "icon": "mdi:car-off",
    })
}

pub fn plate_event(candidate: &PlateCandidate, is_target: bool) -> Value {
    json!({
        "plate": candidate.plate,
        "confidence": confidence_percent(candidate.ocr_confidence),
        "is_target": is_target,
    })
}
