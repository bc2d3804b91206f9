//! Metrics collection and exposition.
//!
//! # Metrics
//! - `jsonapi_requests_total` (counter): requests by method, route, status
//! - `jsonapi_request_duration_seconds` (histogram): dispatch latency
//!
//! # Design Decisions
//! - Labels use the route pattern (`/users/:id`), never the raw path
//! - Router-level misses are labelled `route="none"`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, route: &str, start_time: Instant) {
    let elapsed = start_time.elapsed().as_secs_f64();
    metrics::counter!(
        "jsonapi_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "jsonapi_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}
