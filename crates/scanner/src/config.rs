use anyhow::{bail, Context, Result};
use common::normalize_plate_text;
use recognizer::RecognizerConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_OPTIONS_PATH: &str = "/data/options.json";

/// Add-on options, loaded once at startup and never changed afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Camera entity to poll, e.g. "camera.gate"
    pub camera_entity: String,

    /// Seconds between the start of two scan cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    /// Plates that switch the target sensor on
    #[serde(default)]
    pub target_plates: Vec<String>,

    /// Detection confidence threshold (0.1 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// Seconds the target sensor stays on after the last target sighting
    #[serde(default = "default_target_timeout")]
    pub target_detected_timeout: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Model paths and pipeline tuning; defaults when absent
    #[serde(default)]
    pub recognizer: Option<RecognizerConfig>,
}

fn default_scan_interval() -> u64 {
    5
}

fn default_confidence() -> f32 {
    0.5
}

fn default_target_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ScannerConfig {
    /// Load from `OPTIONS_PATH`, falling back to [`DEFAULT_OPTIONS_PATH`]
    pub fn from_env() -> Result<Self> {
        let path = env::var("OPTIONS_PATH").unwrap_or_else(|_| DEFAULT_OPTIONS_PATH.to_string());
        Self::load(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!(
                "options file not found: {}. The scanner must run with its add-on options mounted",
                path.display()
            );
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid options in {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: ScannerConfig = serde_json::from_str(raw)?;
        config.target_plates = config
            .target_plates
            .iter()
            .map(|plate| normalize_plate_text(plate))
            .filter(|plate| !plate.is_empty())
            .collect();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera_entity.trim().is_empty() {
            bail!("camera_entity must not be empty");
        }
        if self.scan_interval == 0 {
            bail!("scan_interval must be at least 1 second");
        }
        if !(0.1..=1.0).contains(&self.confidence_threshold) {
            bail!(
                "confidence_threshold must be within [0.1, 1.0], got {}",
                self.confidence_threshold
            );
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_detected_timeout)
    }

    pub fn is_target(&self, plate: &str) -> bool {
        self.target_plates.iter().any(|target| target == plate)
    }

    /// Recogniser settings with the detection threshold taken from these options
    pub fn recognizer_config(&self) -> RecognizerConfig {
        let mut config = self.recognizer.clone().unwrap_or_default();
        config.confidence_threshold = self.confidence_threshold;
        config
    }
}
