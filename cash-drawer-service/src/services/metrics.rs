//! Prometheus metrics for cash-drawer-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Session lifecycle counter.
pub static SESSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "drawer_sessions_total",
        "Total number of session transitions",
        &["transition"] // opened, closed - not operator_id to avoid cardinality explosion
    )
    .expect("Failed to register sessions_total")
});

/// Movement counter by type.
pub static MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "drawer_movements_total",
        "Total number of ledger movements recorded",
        &["movement_type"]
    )
    .expect("Failed to register movements_total")
});

/// Payment counter by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "drawer_payments_total",
        "Total number of payments recorded",
        &["method"]
    )
    .expect("Failed to register payments_total")
});

/// Refund counter.
pub static REFUNDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "drawer_refunds_total",
        "Total number of refunds issued",
        &["status"] // ok, rejected
    )
    .expect("Failed to register refunds_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "drawer_errors_total",
        "Total number of errors by type",
        &["error_type"] // db_error, validation, conflict, etc.
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "drawer_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SESSIONS_TOTAL);
    Lazy::force(&MOVEMENTS_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&REFUNDS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Record an error by stable kind label.
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
