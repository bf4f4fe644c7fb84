//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests entering the pipeline
//! - `http_panics_recovered_total` (counter): handler panics turned into 500s
//! - `lifecycle_transitions_total` (counter): state changes, by target state
//! - `server_ready` (gauge): 1 while the readiness gate is open
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str) {
    metrics::counter!("http_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_panic() {
    metrics::counter!("http_panics_recovered_total").increment(1);
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("lifecycle_transitions_total", "to" => to).increment(1);
}

pub fn record_ready(ready: bool) {
    metrics::gauge!("server_ready").set(if ready { 1.0 } else { 0.0 });
}
