//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_blocks_appended_total` (counter)
//! - `ledger_mining_duration_seconds` (histogram)
//! - `ledger_mining_hashes_total` (counter)
//! - `ledger_chain_length` (gauge)
//! - `ledger_listener_failures_total` (counter)
//! - `wallet_status` (gauge): 0=not installed, 1=disconnected, 2=connecting, 3=connected
//! - `wallet_refresh_failures_total` (counter, by operation)
//! - `wallet_provider_events_total` (counter, by event)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_block_appended(chain_len: usize, mining_time: Duration, hashes: u64) {
    metrics::counter!("ledger_blocks_appended_total").increment(1);
    metrics::counter!("ledger_mining_hashes_total").increment(hashes);
    metrics::histogram!("ledger_mining_duration_seconds").record(mining_time.as_secs_f64());
    metrics::gauge!("ledger_chain_length").set(chain_len as f64);
}

pub fn record_chain_length(chain_len: usize) {
    metrics::gauge!("ledger_chain_length").set(chain_len as f64);
}

pub fn record_listener_failure() {
    metrics::counter!("ledger_listener_failures_total").increment(1);
}

pub fn record_wallet_status(code: u8) {
    metrics::gauge!("wallet_status").set(code as f64);
}

pub fn record_refresh_failure(operation: &'static str) {
    metrics::counter!("wallet_refresh_failures_total", "operation" => operation).increment(1);
}

pub fn record_provider_event(event: &'static str) {
    metrics::counter!("wallet_provider_events_total", "event" => event).increment(1);
}
