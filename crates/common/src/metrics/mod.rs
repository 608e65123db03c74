//! Metrics and observability utilities
//!
//! Prometheus metrics with SLO-aligned histograms and standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ClassData metrics
pub const METRICS_PREFIX: &str = "classdata";

/// SLO-aligned histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.075, 0.100, 0.150, 0.250, 0.500, 1.000, 2.500, 5.000,
    10.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_submissions_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Submissions ingested, labeled by outcome (created/deduplicated)"
    );

    describe_counter!(
        format!("{}_submissions_duplicate_total", METRICS_PREFIX),
        Unit::Count,
        "Duplicate uploads answered from the existing row"
    );

    describe_histogram!(
        format!("{}_ingest_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Submission ingestion latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_swept_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Expired cache rows removed by the background sweep"
    );
}

/// Record one ingestion and its latency
pub fn record_ingest(started: Instant, deduplicated: bool) {
    let outcome = if deduplicated { "deduplicated" } else { "created" };
    counter!(
        format!("{}_submissions_ingested_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if deduplicated {
        counter!(format!("{}_submissions_duplicate_total", METRICS_PREFIX)).increment(1);
    }

    histogram!(format!("{}_ingest_duration_seconds", METRICS_PREFIX))
        .record(started.elapsed().as_secs_f64());
}

/// Record rows removed by one cache sweep run
pub fn record_sweep(removed: u64) {
    counter!(format!("{}_cache_swept_rows_total", METRICS_PREFIX)).increment(removed);
}
