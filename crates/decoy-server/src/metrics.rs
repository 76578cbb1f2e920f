//! Prometheus metrics for decoy-server.
//!
//! Tracks request matching, registrations, reconciliation passes and store
//! operations.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_gauge, CounterVec, Encoder, IntGauge, TextEncoder,
};

lazy_static! {
    /// Stubbed requests by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_requests_total",
        "Total number of stubbed requests served",
        &["result"]  // result: matched|unmatched|bad_request
    )
    .unwrap();

    /// Registrations by outcome
    pub static ref REGISTRATIONS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_registrations_total",
        "Total number of mapping registrations",
        &["result"]  // result: accepted|rejected
    )
    .unwrap();

    /// Reconciliation passes
    pub static ref SYNC_PASSES_TOTAL: CounterVec = register_counter_vec!(
        "decoy_sync_passes_total",
        "Total number of cache/store reconciliation passes",
        &["result"]  // result: ok|fetch_failed
    )
    .unwrap();

    /// Document store operations
    pub static ref STORE_OPS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_store_ops_total",
        "Total number of document store operations",
        &["operation", "result"]  // operation: fetch|put|delete|list, result: success|error
    )
    .unwrap();

    /// Mappings currently held in the cache
    pub static ref CACHED_MAPPINGS: IntGauge = register_int_gauge!(
        "decoy_cached_mappings",
        "Number of mappings in the in-memory cache"
    )
    .unwrap();
}

pub fn record_request(result: &str) {
    REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_registration(result: &str) {
    REGISTRATIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_sync_pass(result: &str) {
    SYNC_PASSES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_store_op(operation: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    STORE_OPS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn set_cached_mappings(count: usize) {
    CACHED_MAPPINGS.set(count as i64);
}

/// Render all registered metrics in the Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
