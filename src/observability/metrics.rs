//! Metrics collection and exposition.
//!
//! # Metrics
//! - `review_router_selections_total` (counter): selection rounds by strategy
//! - `review_router_selected_providers` (gauge): size of the last selection
//! - `review_router_circuit_transitions_total` (counter): by provider, target state
//! - `review_router_rate_limited_total` (counter): cooldowns by provider, reason
//! - `review_router_outcomes_total` (counter): reported outcomes by provider, result
//! - `review_router_review_duration_seconds` (histogram): by provider
//! - `review_router_reliability_score` (gauge): last aggregated score by provider
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is opt-in via config

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_selection(strategy: &'static str, selected: usize) {
    counter!("review_router_selections_total", "strategy" => strategy).increment(1);
    gauge!("review_router_selected_providers").set(selected as f64);
}

pub fn record_circuit_transition(provider: &str, state: CircuitState) {
    counter!(
        "review_router_circuit_transitions_total",
        "provider" => provider.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

pub fn record_rate_limited(provider: &str, reason: &str) {
    counter!(
        "review_router_rate_limited_total",
        "provider" => provider.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

pub fn record_outcome(provider: &str, success: bool, duration_ms: Option<u64>) {
    let result = if success { "success" } else { "failure" };
    counter!(
        "review_router_outcomes_total",
        "provider" => provider.to_string(),
        "result" => result
    )
    .increment(1);
    if let Some(ms) = duration_ms {
        histogram!("review_router_review_duration_seconds", "provider" => provider.to_string())
            .record(ms as f64 / 1000.0);
    }
}

pub fn record_reliability_score(provider: &str, score: f64) {
    gauge!("review_router_reliability_score", "provider" => provider.to_string()).set(score);
}
