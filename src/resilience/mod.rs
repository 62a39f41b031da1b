//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Provider round-trip / mining job:
//!     → timeouts.rs (enforce a deadline, name the operation)
//!     → On node failure: backoff.rs (space out re-polls with jitter)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Timeout errors are distinct from other errors

pub mod backoff;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use timeouts::{bounded, Elapsed};
