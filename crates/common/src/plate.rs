//! Italian plate grammar and the text/confidence normalisation applied at the
//! OCR boundary.

use once_cell::sync::Lazy;
use regex::Regex;

/// Two letters, three digits, two letters
pub const PLATE_PATTERN: &str = "^[A-Z]{2}[0-9]{3}[A-Z]{2}$";

pub const PLATE_LENGTH: usize = 7;

/// Characters the OCR engine may emit
pub const OCR_ALLOWLIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

static PLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(PLATE_PATTERN).expect("plate pattern is valid"));

/// Check a normalised string against the plate grammar
pub fn is_valid_plate(text: &str) -> bool {
    text.len() == PLATE_LENGTH && PLATE_REGEX.is_match(text)
}

/// Strip whitespace, ASCII-uppercase and drop anything outside the allow-list
pub fn normalize_plate_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| OCR_ALLOWLIST.contains(*c))
        .collect()
}

/// Map an engine confidence onto [0, 1].
///
/// Engines report either a probability or a percentage; anything above 1.0 is
/// read as a percentage.
pub fn normalize_confidence(raw: f32) -> f32 {
    if raw.is_nan() {
        return 0.0;
    }
    let value = if raw > 1.0 { raw / 100.0 } else { raw };
    value.clamp(0.0, 1.0)
}
