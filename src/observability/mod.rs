//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger and wallet services produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates go through the `metrics` facade; with no recorder
//!   installed they are no-ops, so library users pay nothing
//! - Log level configurable via config and environment

pub mod logging;
pub mod metrics;
