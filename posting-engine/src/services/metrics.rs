//! Prometheus metrics for the posting engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Posting run counter by terminal status.
pub static RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "posting_runs_total",
        "Total number of posting runs",
        &["status"] // completed, failed, duplicate - not tenant_id to avoid cardinality explosion
    )
    .expect("Failed to register posting_runs_total")
});

/// Per-rule outcome counter.
pub static RULE_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "posting_rule_outcomes_total",
        "Per-rule posting outcomes",
        &["outcome"] // posted, skipped, failed
    )
    .expect("Failed to register posting_rule_outcomes_total")
});

/// Subledger entry counter by direction.
pub static SUBLEDGER_ENTRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "posting_subledger_entries_total",
        "Total number of subledger entries created",
        &["direction"]
    )
    .expect("Failed to register subledger_entries_total")
});

/// Error counter for alerting. Failed postings surface here; an alert on
/// this series is the operational path for spotting unposted documents.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "posting_errors_total",
        "Total number of errors by type",
        &["error_type"] // db_error, posting_failed, etc.
    )
    .expect("Failed to register posting_errors_total")
});

/// End-to-end posting sequence duration by trigger.
pub static POSTING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "posting_run_duration_seconds",
        "Posting run duration in seconds",
        &["trigger"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register posting_run_duration")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "posting_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RUNS_TOTAL);
    Lazy::force(&RULE_OUTCOMES_TOTAL);
    Lazy::force(&SUBLEDGER_ENTRIES_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&POSTING_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
