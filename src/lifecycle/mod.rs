//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build ledger → Discover wallet provider
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel mining → Dispose wallet manager → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Services are constructed explicitly and owned by the caller; nothing
//!   is created at module load time
//! - Ordered shutdown: stop producers first, then release provider listeners

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Services;
