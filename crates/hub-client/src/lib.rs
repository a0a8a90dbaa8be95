//! Client for the home-automation hub REST API: camera snapshots in, plate
//! sensors and events out.
pub mod client;
pub mod mjpeg;
pub mod sensors;

pub use client::{HubApi, HubClient, DEFAULT_BASE_URL};
pub use mjpeg::MjpegFrameReader;
