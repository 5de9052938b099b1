//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, outcome
//! - `gateway_request_duration_seconds` (histogram): latency by outcome
//! - `gateway_denied_total` (counter): policy denials by reason
//! - `gateway_policy_reloads_total` (counter): reloads by result
//! - `gateway_policy_header_rules` / `gateway_policy_denied_paths` (gauges)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::policy::PolicyStore;
use crate::security::admission::DenyReason;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request. `outcome` is `allowed`, a deny reason, or `upstream_error`.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_denied(reason: DenyReason) {
    counter!("gateway_denied_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_policy_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("gateway_policy_reloads_total", "result" => result).increment(1);
}

/// Publish the size of the active policy.
pub fn record_policy_snapshot(store: &PolicyStore) {
    gauge!("gateway_policy_header_rules").set(store.header_rules().len() as f64);
    gauge!("gateway_policy_denied_paths").set(store.path_deny().len() as f64);
}
