use crate::config::ScannerConfig;
use crate::target::TargetIndicator;
use common::PlateCandidate;
use hub_client::HubApi;
use recognizer::PlateRecognizer;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics::{SCANNER_CYCLES, SCANNER_TARGET_MATCHES};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What one scan cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The camera gave no image
    NoSnapshot,
    /// The image could not be decoded
    DecodeFailed,
    /// The recognition task itself died
    RecognitionFailed,
    Scanned { plates: usize, targets: usize },
}

impl CycleOutcome {
    fn status(&self) -> &'static str {
        match self {
            CycleOutcome::NoSnapshot => "no_snapshot",
            CycleOutcome::DecodeFailed => "decode_error",
            CycleOutcome::RecognitionFailed => "recognition_error",
            CycleOutcome::Scanned { .. } => "ok",
        }
    }
}

pub struct Scanner {
    config: ScannerConfig,
    hub: Arc<dyn HubApi>,
    recognizer: Arc<PlateRecognizer>,
    target: TargetIndicator,
}

impl Scanner {
    pub fn new(config: ScannerConfig, hub: Arc<dyn HubApi>, recognizer: Arc<PlateRecognizer>) -> Self {
        let target = TargetIndicator::new(config.target_timeout());
        Self {
            config,
            hub,
            recognizer,
            target,
        }
    }

    /// Scan every `scan_interval` until `cancel` fires.
    ///
    /// A cycle that overruns the interval is followed immediately by the next
    /// one; cancellation is observed between cycles and during the wait.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            camera = %self.config.camera_entity,
            interval_secs = self.config.scan_interval,
            targets = self.config.target_plates.len(),
            "Entering main scan loop"
        );

        let mut interval = time::interval(self.config.scan_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Scan loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.scan_once().await;
                }
            }
        }
    }

    /// One full cycle: snapshot, recognise, report, expire the target sensor
    pub async fn scan_once(&mut self) -> CycleOutcome {
        let outcome = self.process_snapshot().await;
        self.expire_target(Instant::now()).await;

        SCANNER_CYCLES.with_label_values(&[outcome.status()]).inc();
        outcome
    }

    async fn process_snapshot(&mut self) -> CycleOutcome {
        let camera = self.config.camera_entity.as_str();

        let jpeg = match self.hub.camera_snapshot(camera).await {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(
                    camera = %camera,
                    error = %format!("{:#}", e),
                    retry_in_secs = self.config.scan_interval,
                    "No snapshot received"
                );
                return CycleOutcome::NoSnapshot;
            }
        };

        let recognizer = Arc::clone(&self.recognizer);
        let plates = match tokio::task::spawn_blocking(move || recognizer.recognize_encoded(&jpeg)).await {
            Ok(Ok(plates)) => plates,
            Ok(Err(e)) => {
                error!(camera = %camera, error = %e, "Failed to decode snapshot");
                return CycleOutcome::DecodeFailed;
            }
            Err(e) => {
                error!(camera = %camera, error = %e, "Recognition task failed");
                return CycleOutcome::RecognitionFailed;
            }
        };

        let plates = dedupe_by_plate(plates);
        let mut targets = 0;

        for candidate in &plates {
            let is_target = self.config.is_target(&candidate.plate);

            if let Err(e) = self.hub.report_plate(candidate, is_target).await {
                error!(plate = %candidate.plate, error = %format!("{:#}", e), "Failed to report plate");
            }

            if is_target {
                targets += 1;
                self.target.arm(Instant::now());
                SCANNER_TARGET_MATCHES.inc();
                info!(plate = %candidate.plate, ">>> TARGET PLATE DETECTED <<<");
            }
        }

        CycleOutcome::Scanned {
            plates: plates.len(),
            targets,
        }
    }

    /// Switch the target sensor off once its hold time has passed at `now`
    pub async fn expire_target(&mut self, now: Instant) {
        if !self.target.take_expired(now) {
            return;
        }

        match self.hub.clear_target().await {
            Ok(()) => info!("Target detection timeout expired, target sensor off"),
            Err(e) => error!(error = %format!("{:#}", e), "Failed to clear target sensor"),
        }
    }
}

/// One candidate per plate text, keeping the most confident read; first-seen
/// order is preserved
pub fn dedupe_by_plate(plates: Vec<PlateCandidate>) -> Vec<PlateCandidate> {
    let mut unique: Vec<PlateCandidate> = Vec::with_capacity(plates.len());

    for candidate in plates {
        match unique.iter_mut().find(|seen| seen.plate == candidate.plate) {
            Some(seen) => {
                if candidate.ocr_confidence > seen.ocr_confidence {
                    *seen = candidate;
                }
            }
            None => unique.push(candidate),
        }
    }

    unique
}
