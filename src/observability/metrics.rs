//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): finished requests by method, status
//! - `gateway_request_duration_seconds` (histogram): time until the response
//!   body finished or was abandoned
//! - `gateway_in_flight_requests` (gauge): requests currently tracked
//! - `gateway_query_rejections_total` (counter): 400s from query validation,
//!   by route
//! - `gateway_streams_opened_total` (counter): event streams by framing mode
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    metrics::describe_counter!("gateway_requests_total", "Finished HTTP requests");
    metrics::describe_histogram!(
        "gateway_request_duration_seconds",
        metrics::Unit::Seconds,
        "Request latency including streamed bodies"
    );
    metrics::describe_gauge!("gateway_in_flight_requests", "Requests currently in flight");
    metrics::describe_counter!(
        "gateway_query_rejections_total",
        "Requests rejected by query validation"
    );
    metrics::describe_counter!("gateway_streams_opened_total", "Event streams opened");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_in_flight(count: usize) {
    metrics::gauge!("gateway_in_flight_requests").set(count as f64);
}

pub fn record_query_rejected(route: &str) {
    metrics::counter!("gateway_query_rejections_total", "route" => route.to_string()).increment(1);
}

pub fn record_stream_opened(mode: &'static str) {
    metrics::counter!("gateway_streams_opened_total", "mode" => mode).increment(1);
}
