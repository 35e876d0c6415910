//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms and
//! standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteSync metrics
pub const METRICS_PREFIX: &str = "citesync";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.075, // 75ms
    0.100, // 100ms
    0.150, // 150ms - P99 target
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
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

    // Renumbering metrics
    describe_counter!(
        format!("{}_renumber_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Total renumbering operations (move, sort, delete, resequence)"
    );

    describe_histogram!(
        format!("{}_renumber_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Renumbering operation latency in seconds"
    );

    describe_counter!(
        format!("{}_references_repositioned_total", METRICS_PREFIX),
        Unit::Count,
        "Total references whose position changed"
    );

    describe_counter!(
        format!("{}_citations_rewritten_total", METRICS_PREFIX),
        Unit::Count,
        "Total citation rows whose raw text was rewritten"
    );

    describe_counter!(
        format!("{}_commit_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Total transient commit failures that triggered a retry"
    );

    // Database metrics
    describe_histogram!(
        format!("{}_db_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Database query latency in seconds"
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

/// Helper to record a completed renumbering operation
pub fn record_renumber(
    duration_secs: f64,
    operation: &str,
    references_updated: usize,
    citations_updated: usize,
) {
    counter!(
        format!("{}_renumber_operations_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_renumber_duration_seconds", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .record(duration_secs);

    counter!(format!("{}_references_repositioned_total", METRICS_PREFIX))
        .increment(references_updated as u64);

    counter!(format!("{}_citations_rewritten_total", METRICS_PREFIX))
        .increment(citations_updated as u64);
}

/// Helper to record a transient commit failure that will be retried
pub fn record_commit_retry(operation: &str) {
    counter!(
        format!("{}_commit_retries_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Buckets are sorted and contain the SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/documents/reorder");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
