//! Metrics collection and exposition.
//!
//! # Metrics
//! - `redirect_clients_total` (counter): classified clients by `family`
//! - `redirect_rewrites_total` (counter): location changes by `stage`
//! - `redirect_malformed_locations_total` (counter): responses turned into 500s
//!
//! # Design Decisions
//! - Updates are no-ops until a recorder is installed
//! - Prometheus exposition is opt-in through `observability.metrics_enabled`

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::client::AddressFamily;

pub const STAGE_PREFIX: &str = "prefix";
pub const STAGE_RULE: &str = "rule";

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_client(family: AddressFamily) {
    metrics::counter!("redirect_clients_total", "family" => family.as_str()).increment(1);
}

pub fn record_rewrite(stage: &'static str) {
    metrics::counter!("redirect_rewrites_total", "stage" => stage).increment(1);
}

pub fn record_malformed_location() {
    metrics::counter!("redirect_malformed_locations_total").increment(1);
}
