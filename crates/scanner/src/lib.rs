//! Scan loop: camera snapshot, plate recognition, hub reporting.
pub mod config;
pub mod scanner;
pub mod target;

pub use config::ScannerConfig;
pub use scanner::{dedupe_by_plate, CycleOutcome, Scanner};
pub use target::TargetIndicator;
