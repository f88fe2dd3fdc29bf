// Prometheus metrics for limits enforcement
//
// Exposes metrics on /metrics HTTP endpoint:
// - Enforcement outcomes per category (counter)
// - Store read failures per category (counter)
// - Store read latency per category (histogram)

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref LIMIT_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("limits_checks_total", "Limit checks by category and outcome"),
        &["category", "outcome"]
    ).expect("Failed to create limit checks metric");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("limits_store_errors_total", "Usage store read failures"),
        &["category"]
    ).expect("Failed to create store errors metric");

    pub static ref STORE_READ_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "limits_store_read_duration_seconds",
            "Usage store count latency in seconds"
        ),
        &["category"]
    ).expect("Failed to create store read duration metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(LIMIT_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_READ_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
