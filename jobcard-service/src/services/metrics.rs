//! Prometheus metrics for jobcard-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "jobcard_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for invoice sync runs.
pub static SYNC_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "jobcard_sync_runs_total",
        "Total number of invoice sync runs",
        &["status"]
    )
    .expect("Failed to register SYNC_RUNS")
});

/// Counter for invoices written during sync, by outcome.
pub static SYNC_UPSERTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "jobcard_sync_upserts_total",
        "Total number of invoices upserted during sync",
        &["outcome"]
    )
    .expect("Failed to register SYNC_UPSERTS")
});

/// Counter for reconciliation checks.
pub static RECONCILE_CHECKS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "jobcard_reconcile_checks_total",
        "Total number of reconciliation checks",
        &["status"]
    )
    .expect("Failed to register RECONCILE_CHECKS")
});

/// Counter for job cards created.
pub static JOB_CARDS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "jobcard_cards_created_total",
        "Total number of job cards created",
        &["status"]
    )
    .expect("Failed to register JOB_CARDS_CREATED")
});

/// Counter for outbound notifications by template and outcome.
pub static NOTIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "jobcard_notifications_total",
        "Total number of outbound notifications",
        &["template", "status"]
    )
    .expect("Failed to register NOTIFICATIONS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&SYNC_RUNS);
    Lazy::force(&SYNC_UPSERTS);
    Lazy::force(&RECONCILE_CHECKS);
    Lazy::force(&JOB_CARDS_CREATED);
    Lazy::force(&NOTIFICATIONS);
}

/// Gather all registered metrics in Prometheus text exposition format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
