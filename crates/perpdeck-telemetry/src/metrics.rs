//! Prometheus metrics for perpdeck.
//!
//! Covers:
//! - Graph node computations, invalidations and teardowns
//! - Wallet bridge transitions and suppressed duplicates
//! - API requests and retries
//! - Submitted actions and signing
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that must crash at
//! startup. These panics only happen during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Node computations by outcome (success/failure/discarded).
pub static NODE_COMPUTE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpdeck_node_compute_total",
        "Graph node computations by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Node computation duration in milliseconds.
pub static NODE_COMPUTE_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "perpdeck_node_compute_ms",
        "Graph node computation duration in milliseconds",
        &["outcome"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Node invalidations (refresh, set, tag, dependency change).
pub static NODE_INVALIDATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "perpdeck_node_invalidated_total",
        "Graph node invalidations"
    )
    .unwrap()
});

/// Node teardowns (last subscriber gone, collect, shutdown).
pub static NODE_TEARDOWN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("perpdeck_node_teardown_total", "Graph node teardowns").unwrap()
});

/// Nodes currently registered in the graph.
pub static NODES_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("perpdeck_nodes_live", "Graph nodes currently registered").unwrap()
});

/// Wallet states forwarded by the bridge.
/// Labels: status (disconnected/connecting/connected)
pub static WALLET_TRANSITION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpdeck_wallet_transition_total",
        "Wallet states forwarded by the bridge",
        &["status"]
    )
    .unwrap()
});

/// Wallet states suppressed as duplicates.
pub static WALLET_SUPPRESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "perpdeck_wallet_suppressed_total",
        "Wallet states suppressed as duplicates"
    )
    .unwrap()
});

/// API requests by endpoint and outcome.
pub static API_REQUEST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpdeck_api_request_total",
        "API requests by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// API retries by endpoint.
pub static API_RETRY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpdeck_api_retry_total",
        "API request retries by endpoint",
        &["endpoint"]
    )
    .unwrap()
});

/// API request latency in milliseconds.
pub static API_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "perpdeck_api_latency_ms",
        "API request latency in milliseconds",
        &["endpoint"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 10000.0]
    )
    .unwrap()
});

/// Actions by kind and outcome (success/failure/defect).
pub static ACTION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpdeck_action_total",
        "Actions by kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Transactions signed by the wallet.
pub static TX_SIGNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "perpdeck_tx_signed_total",
        "Transactions signed by the wallet"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished node computation.
    pub fn node_computed(outcome: &str, duration_ms: f64) {
        NODE_COMPUTE_TOTAL.with_label_values(&[outcome]).inc();
        NODE_COMPUTE_MS
            .with_label_values(&[outcome])
            .observe(duration_ms);
    }

    /// Record node invalidations.
    pub fn nodes_invalidated(count: usize) {
        NODE_INVALIDATED_TOTAL.inc_by(count as u64);
    }

    /// Record a node teardown.
    pub fn node_torn_down() {
        NODE_TEARDOWN_TOTAL.inc();
    }

    /// Set the number of registered nodes.
    pub fn nodes_live(count: usize) {
        NODES_LIVE.set(count as i64);
    }

    /// Record a forwarded wallet state.
    pub fn wallet_transition(status: &str) {
        WALLET_TRANSITION_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record a suppressed duplicate wallet state.
    pub fn wallet_suppressed() {
        WALLET_SUPPRESSED_TOTAL.inc();
    }

    /// Record a finished API request.
    pub fn api_request(endpoint: &str, outcome: &str, latency_ms: f64) {
        API_REQUEST_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
        API_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
    }

    /// Record an API retry.
    pub fn api_retry(endpoint: &str) {
        API_RETRY_TOTAL.with_label_values(&[endpoint]).inc();
    }

    /// Record an action outcome.
    pub fn action(kind: &str, outcome: &str) {
        ACTION_TOTAL.with_label_values(&[kind, outcome]).inc();
    }

    /// Record signed transactions.
    pub fn transactions_signed(count: usize) {
        TX_SIGNED_TOTAL.inc_by(count as u64);
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = WALLET_TRANSITION_TOTAL
            .with_label_values(&["connected"])
            .get();
        Metrics::wallet_transition("connected");
        let after = WALLET_TRANSITION_TOTAL
            .with_label_values(&["connected"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_render_contains_registered_metric() {
        Metrics::action("open", "success");
        let text = Metrics::render().unwrap();
        assert!(text.contains("perpdeck_action_total"));
    }
}
