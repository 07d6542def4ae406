//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, latency, lifecycle events)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by method, status, outcome
//! - `switchyard_request_duration_seconds` (histogram): dispatch latency
//! - `switchyard_events_total` (counter): lifecycle events emitted, by event
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels stay low-cardinality: no paths, only outcomes

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
/// Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, outcome: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("outcome", outcome.to_string()),
    ];
    metrics::counter!("switchyard_requests_total", &labels).increment(1);
    metrics::histogram!("switchyard_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record one lifecycle event emission.
pub fn record_event(event: &str) {
    metrics::counter!("switchyard_events_total", "event" => event.to_string()).increment(1);
}
