//! Structured logging.
//!
//! Uses the tracing crate. `RUST_LOG` wins over the configured level so a
//! deployment can raise verbosity without touching the config file.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

/// Default filter directive built from the configured level.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!("legacy_core={},ledger_cli={}", config.log_level, config.log_level)
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(config).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
