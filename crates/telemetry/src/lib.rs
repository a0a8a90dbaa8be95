//! Logging and metrics shared by the scanner crates.

pub mod logging;
pub mod metrics;

pub use logging::{init_structured_logging, LogConfig, LogFormat};
