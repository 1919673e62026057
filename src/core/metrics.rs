//! Prometheus metrics for the fallback controller and HTTP surface
//!
//! Counters are registered in the default registry and exposed at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Extractor attempts by operation and outcome
/// Labels: operation (metadata/download), outcome (success or error class label)
pub static EXTRACTOR_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vidfront_extractor_attempts_total",
        "Total number of extractor invocations by operation and outcome",
        &["operation", "outcome"]
    )
    .unwrap()
});

/// Operations that exhausted every persona
/// Labels: operation
pub static OPERATION_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vidfront_operation_failures_total",
        "Total number of operations that exhausted every client persona",
        &["operation"]
    )
    .unwrap()
});

/// Duration of a whole fallback run
/// Labels: operation
pub static OPERATION_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "vidfront_operation_duration_seconds",
        "Time spent in the fallback controller per operation",
        &["operation"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
    )
    .unwrap()
});

/// HTTP requests by route and status
/// Labels: route, status
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vidfront_http_requests_total",
        "Total number of HTTP requests by route and status code",
        &["route", "status"]
    )
    .unwrap()
});

/// Records a single extractor attempt
pub fn record_attempt(operation: &str, outcome: &str) {
    EXTRACTOR_ATTEMPTS_TOTAL.with_label_values(&[operation, outcome]).inc();
}

/// Records an operation that ran out of personas
pub fn record_exhausted(operation: &str) {
    OPERATION_FAILURES_TOTAL.with_label_values(&[operation]).inc();
}

/// Records a handled HTTP request
pub fn record_request(route: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[route, &status.to_string()])
        .inc();
}
