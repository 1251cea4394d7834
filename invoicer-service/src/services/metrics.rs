//! Prometheus metrics for invoicer-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicer_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Stock ledger adjustments by reason (bounded set, no product ids).
pub static STOCK_ADJUSTMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicer_stock_adjustments_total",
        "Total number of stock ledger adjustments recorded",
        &["reason"]
    )
    .expect("Failed to register stock_adjustments_total")
});

/// Rejected adjustments that would have driven stock negative.
pub static OUT_OF_STOCK_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoicer_out_of_stock_total",
        "Total number of adjustments rejected for insufficient stock"
    )
    .expect("Failed to register out_of_stock_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&STOCK_ADJUSTMENTS_TOTAL);
    Lazy::force(&OUT_OF_STOCK_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
