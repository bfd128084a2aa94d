//! Metrics and observability utilities
//!
//! Provides metric descriptions and recording helpers with standardized
//! naming. The exporter is installed by the binary.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all framecheck metrics
pub const METRICS_PREFIX: &str = "framecheck";

/// Histogram buckets for audit and model latency (in seconds).
/// Grounded generation routinely takes tens of seconds.
pub const AUDIT_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Audit metrics
    describe_counter!(
        format!("{}_audits_total", METRICS_PREFIX),
        Unit::Count,
        "Total audits by outcome"
    );

    describe_histogram!(
        format!("{}_audit_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end audit latency in seconds"
    );

    // Model metrics
    describe_histogram!(
        format!("{}_model_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Model service latency in seconds"
    );

    describe_counter!(
        format!("{}_model_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed model service calls"
    );

    // Normalization metrics
    describe_counter!(
        format!("{}_normalization_repairs_total", METRICS_PREFIX),
        Unit::Count,
        "Model outputs that needed a repair stage to parse"
    );

    describe_gauge!(
        format!("{}_dangling_references", METRICS_PREFIX),
        Unit::Count,
        "Framing entries in the last report that reference no claim"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a finished audit. `outcome` is "success" or an error kind.
pub fn record_audit(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_audits_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_audit_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// Helper to record model service metrics
pub fn record_model_request(duration_secs: f64, model: &str, success: bool) {
    if success {
        histogram!(
            format!("{}_model_request_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_model_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record normalization metrics
pub fn record_normalization(repaired_by: Option<&str>, dangling_references: usize) {
    if let Some(strategy) = repaired_by {
        counter!(
            format!("{}_normalization_repairs_total", METRICS_PREFIX),
            "strategy" => strategy.to_string()
        )
        .increment(1);
    }

    gauge!(format!("{}_dangling_references", METRICS_PREFIX)).set(dangling_references as f64);
}
