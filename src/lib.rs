//! Italian licence plate detection and recognition, reported to a
//! home-automation hub.
//!
//! - [`recognizer`]: detector + OCR pipeline over still images
//! - [`hub_client`]: camera snapshots in, sensors and events out
//! - [`scanner`]: the periodic scan loop tying both together
pub use common;
pub use hub_client;
pub use recognizer;
pub use scanner;
pub use telemetry;
