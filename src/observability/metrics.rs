//! Metrics collection and exposition.
//!
//! # Metrics
//! - `treqs_requests_total` (counter): requests by classified action
//! - `treqs_traces_total` (counter): trace attempts by outcome
//! - `treqs_trace_duration_seconds` (histogram): time the exclusive lock was
//!   held for recording
//! - `treqs_trace_bytes` (histogram): size of captured traces
//! - `treqs_sessions` (gauge): stored trace sessions

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_action(action: &'static str) {
    metrics::counter!("treqs_requests_total", "action" => action).increment(1);
}

pub fn record_trace(elapsed: Duration, bytes: usize) {
    metrics::counter!("treqs_traces_total", "outcome" => "captured").increment(1);
    metrics::histogram!("treqs_trace_duration_seconds").record(elapsed.as_secs_f64());
    metrics::histogram!("treqs_trace_bytes").record(bytes as f64);
}

pub fn record_trace_failure() {
    metrics::counter!("treqs_traces_total", "outcome" => "failed").increment(1);
}

pub fn record_sessions(count: usize) {
    metrics::gauge!("treqs_sessions").set(count as f64);
}
