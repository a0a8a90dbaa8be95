pub mod detection;
pub mod plate;

pub use detection::{BoundingBox, Detection, PlateCandidate};
pub use plate::{
    is_valid_plate, normalize_confidence, normalize_plate_text, OCR_ALLOWLIST, PLATE_LENGTH,
    PLATE_PATTERN,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
