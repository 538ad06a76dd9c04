/// Metrics and telemetry for the ORGiD validator
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Resolution cache hits, misses and degraded operations
/// - Resolver calls
/// - Verification outcomes

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    // ========== Cache Metrics ==========

    /// Cache reads by result (hit, miss, disabled)
    pub static ref CACHE_READS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "orgid_cache_reads_total",
        "Total number of resolution cache reads",
        &["result"]
    )
    .unwrap();

    /// Cache writes by result (stored, disabled)
    pub static ref CACHE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "orgid_cache_writes_total",
        "Total number of resolution cache writes",
        &["result"]
    )
    .unwrap();

    /// Cache operations that degraded to miss/no-op because the store failed
    pub static ref CACHE_DEGRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "orgid_cache_degraded_total",
        "Total number of cache operations degraded by store errors",
        &["operation"]
    )
    .unwrap();

    // ========== Resolution Metrics ==========

    /// Resolver calls by status (resolved, not_found, error)
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "orgid_resolutions_total",
        "Total number of resolver calls",
        &["status"]
    )
    .unwrap();

    // ========== Verification Metrics ==========

    /// Verification outcomes
    pub static ref VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "orgid_verifications_total",
        "Total number of JWT verifications by outcome",
        &["outcome"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a cache read
pub fn record_cache_read(result: &str) {
    CACHE_READS_TOTAL.with_label_values(&[result]).inc();
}

/// Record a cache write
pub fn record_cache_write(result: &str) {
    CACHE_WRITES_TOTAL.with_label_values(&[result]).inc();
}

/// Record a degraded cache operation
pub fn record_cache_degraded(operation: &str) {
    CACHE_DEGRADED_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a resolver call
pub fn record_resolution(status: &str) {
    RESOLUTIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a verification outcome
pub fn record_verification(outcome: &str) {
    VERIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}
