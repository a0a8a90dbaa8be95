use anyhow::{Context, Result};
use hub_client::{HubApi, HubClient};
use recognizer::PlateRecognizer;
use scanner::{Scanner, ScannerConfig};
use std::sync::Arc;
use telemetry::LogConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load options before logging so the configured level applies from the start
    let config = ScannerConfig::from_env()?;

    let _log_guard = telemetry::init_structured_logging(
        LogConfig::new("plate-scanner")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_level(&config.log_level),
    );

    info!("=== Plate scanner starting ===");
    info!(
        camera = %config.camera_entity,
        targets = ?config.target_plates,
        scan_interval_secs = config.scan_interval,
        confidence_threshold = config.confidence_threshold,
        target_timeout_secs = config.target_detected_timeout,
        "Loaded configuration"
    );

    let hub = Arc::new(HubClient::from_env()?);
    info!(base_url = %hub.base_url(), "Hub client ready");

    let recognizer_config = config.recognizer_config();
    let recognizer = tokio::task::spawn_blocking(move || PlateRecognizer::from_config(recognizer_config))
        .await
        .context("recognizer initialization panicked")?
        .context("failed to initialize plate recognizer")?;
    info!("Plate recognizer ready");

    if let Err(e) = hub.init_sensors().await {
        error!(error = %format!("{:#}", e), "Failed to initialize sensors");
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut scanner = Scanner::new(config, hub, Arc::new(recognizer));
    scanner.run(cancel).await;

    match telemetry::metrics::encode_metrics() {
        Ok(metrics) => debug!(metrics = %metrics, "Final metrics"),
        Err(e) => error!(error = %e, "Failed to encode metrics"),
    }
    info!("=== Plate scanner stopped ===");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
    cancel.cancel();
}
