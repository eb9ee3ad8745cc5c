//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the request, pool and cache metrics
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `webcmd_requests_total` (counter): requests by method, status, route
//! - `webcmd_request_duration_seconds` (histogram): latency by route, command included
//! - `webcmd_pool_checkouts_total` (counter): shells taken from the pool
//! - `webcmd_pool_available` (gauge): shells ready in the pool
//! - `webcmd_cache_lookups_total` (counter): cache lookups by result (hit, miss)
//!
//! # Design Decisions
//! - The `metrics` facade keeps recording a no-op until the exporter is installed
//! - Labels are bounded: route labels come from the config, never from request paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "webcmd_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);

    metrics::histogram!("webcmd_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a shell taken from the pool.
pub fn record_pool_checkout() {
    metrics::counter!("webcmd_pool_checkouts_total").increment(1);
}

/// Record the number of ready shells.
pub fn record_pool_available(available: usize) {
    metrics::gauge!("webcmd_pool_available").set(available as f64);
}

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("webcmd_cache_lookups_total", "result" => result).increment(1);
}
