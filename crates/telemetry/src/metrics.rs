use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Scanner Metrics ====
    pub static ref SCANNER_CYCLES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("scanner_cycles_total", "Total number of scan cycles"),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SCANNER_TARGET_MATCHES: IntCounter = {
        let metric = IntCounter::new(
            "scanner_target_matches_total",
            "Total number of recognised plates that are on the target list",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SCANNER_HUB_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("scanner_hub_requests_total", "Total number of hub API requests"),
            &["operation", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Recognizer Metrics ====
    pub static ref RECOGNIZER_FRAMES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("recognizer_frames_total", "Total number of frames processed"),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RECOGNIZER_DETECTIONS: IntCounter = {
        let metric = IntCounter::new(
            "recognizer_detections_total",
            "Total number of plate regions surviving NMS",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RECOGNIZER_PLATES: IntCounter = {
        let metric = IntCounter::new(
            "recognizer_plates_total",
            "Total number of grammar-valid plates read",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RECOGNIZER_OCR_VARIANTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "recognizer_ocr_variants_total",
                "OCR attempts per preprocessing strategy and outcome",
            ),
            &["strategy", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RECOGNIZER_STAGE_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "recognizer_stage_latency_seconds",
                "Latency of recognizer stages",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["stage"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
