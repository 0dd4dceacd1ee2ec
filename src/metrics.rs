//! Prometheus metrics for application observability.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_auth_decisions_total` - Auth gate outcomes (label: outcome)
//! - `gateway_analyzer_requests_total` - Analyzer calls (label: status)
//! - `gateway_circuit_breaker_opens_total` - Times the analyzer circuit opened
//! - `gateway_circuit_breaker_rejections_total` - Calls refused by an open circuit
//!
//! ## Histograms
//! - `gateway_analyzer_duration_seconds` - Analyzer call latency
//!
//! ## Gauges
//! - `gateway_circuit_breaker_state` - 0 = closed, 1 = half-open, 2 = open
//!
//! Recording functions are no-ops until [`init_metrics`] installs the
//! exporter, so tests can call into instrumented code freely.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const AUTH_DECISIONS_TOTAL: &str = "gateway_auth_decisions_total";
    pub const ANALYZER_REQUESTS_TOTAL: &str = "gateway_analyzer_requests_total";
    pub const ANALYZER_DURATION_SECONDS: &str = "gateway_analyzer_duration_seconds";
    pub const CIRCUIT_BREAKER_OPENS_TOTAL: &str = "gateway_circuit_breaker_opens_total";
    pub const CIRCUIT_BREAKER_REJECTIONS_TOTAL: &str = "gateway_circuit_breaker_rejections_total";
    pub const CIRCUIT_BREAKER_STATE: &str = "gateway_circuit_breaker_state";
}

/// Install the Prometheus exporter and describe all metrics.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::AUTH_DECISIONS_TOTAL,
        "Inter-service auth gate decisions by outcome"
    );
    describe_counter!(
        names::ANALYZER_REQUESTS_TOTAL,
        "AI analyzer requests by result status"
    );
    describe_counter!(
        names::CIRCUIT_BREAKER_OPENS_TOTAL,
        "Total number of times the analyzer circuit breaker opened"
    );
    describe_counter!(
        names::CIRCUIT_BREAKER_REJECTIONS_TOTAL,
        "Analyzer calls rejected by an open circuit breaker"
    );
    describe_histogram!(
        names::ANALYZER_DURATION_SECONDS,
        "AI analyzer request duration in seconds"
    );
    describe_gauge!(
        names::CIRCUIT_BREAKER_STATE,
        "Analyzer circuit breaker state (0 = closed, 1 = half-open, 2 = open)"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record an auth gate decision (`authenticated`, `missing_credential`, ...).
pub fn record_auth_decision(outcome: &'static str) {
    counter!(names::AUTH_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record the result of an analyzer call.
pub fn record_analyzer_request(status: &'static str, duration_secs: f64) {
    counter!(names::ANALYZER_REQUESTS_TOTAL, "status" => status).increment(1);
    histogram!(names::ANALYZER_DURATION_SECONDS, "status" => status).record(duration_secs);
}

pub fn record_circuit_breaker_open() {
    counter!(names::CIRCUIT_BREAKER_OPENS_TOTAL).increment(1);
}

pub fn record_circuit_breaker_rejection() {
    counter!(names::CIRCUIT_BREAKER_REJECTIONS_TOTAL).increment(1);
}

/// States: 0 = closed, 1 = half-open, 2 = open
pub fn set_circuit_breaker_state(state: u8) {
    gauge!(names::CIRCUIT_BREAKER_STATE).set(f64::from(state));
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed in unit tests; these only check nothing panics.

    #[test]
    fn test_record_auth_decision() {
        record_auth_decision("authenticated");
        record_auth_decision("token_invalid");
    }

    #[test]
    fn test_record_analyzer_request() {
        record_analyzer_request("success", 0.42);
    }

    #[test]
    fn test_set_circuit_breaker_state() {
        set_circuit_breaker_state(0);
        set_circuit_breaker_state(2);
    }
}
