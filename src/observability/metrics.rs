//! Metrics collection and exposition.
//!
//! # Metrics
//! - `momentum_http_requests_total` (counter): requests by method, route, status
//! - `momentum_http_request_duration_seconds` (histogram): latency distribution
//! - `momentum_tasks_total` (counter): task lifecycle events
//! - `momentum_verifications_total` (counter): verification outcomes
//! - `momentum_rewards_total` (counter): reward outcomes
//! - `momentum_ledger_calls_total` (counter): ledger calls by method and outcome
//! - `momentum_rate_limited_total` (counter): rejected requests
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "momentum_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "momentum_http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a task lifecycle event (created, updated, completed, deleted).
pub fn record_task_event(event: &'static str) {
    counter!("momentum_tasks_total", "event" => event).increment(1);
}

/// Record a verification outcome.
pub fn record_verification(outcome: &'static str) {
    counter!("momentum_verifications_total", "outcome" => outcome).increment(1);
}

/// Record a reward outcome.
pub fn record_reward(outcome: &'static str) {
    counter!("momentum_rewards_total", "outcome" => outcome).increment(1);
}

/// Record a ledger call.
pub fn record_ledger_call(method: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("momentum_ledger_calls_total", "method" => method, "outcome" => outcome).increment(1);
}

/// Record a rate-limited request.
pub fn record_rate_limited() {
    counter!("momentum_rate_limited_total").increment(1);
}
