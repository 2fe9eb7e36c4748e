//! Prometheus metrics for request counts and latency.
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can record freely. The binary installs the Prometheus exporter when
//! `METRICS_PORT` is set.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

use crate::error::ServerError;

/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_HTTP_REQUESTS,
        "Total number of HTTP requests, by method and status"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus exporter on its own listener.
///
/// Must be called from within a Tokio runtime.
pub fn install_exporter(port: u16) -> Result<SocketAddr, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!(%addr, "metrics exporter listening");
    Ok(addr)
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    counter!(
        METRIC_HTTP_REQUESTS,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "method" => method.to_string()).record(latency_ms);
}
