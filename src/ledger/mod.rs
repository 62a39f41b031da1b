//! Tamper-evident event ledger.
//!
//! # Data Flow
//! ```text
//! Producer (login form, reset flow, ...)
//!     → Ledger::append(payload)
//!         → block.rs (candidate linked to the tail, canonical encoding)
//!         → miner.rs (proof-of-work on a blocking worker, cancellable)
//!         → chain.rs (publish new immutable snapshot)
//!         → listeners.rs (notify subscribers in registration order)
//!
//! Consumer
//!     → Ledger::snapshot() / Ledger::verify()
//!     → records.rs (typed payloads, wait for a matching block)
//! ```
//!
//! # Invariants
//! - `chain[i].previous_hash == chain[i-1].hash` and `chain[i].index == chain[i-1].index + 1`
//! - Every appended block hash starts with `difficulty` `'0'` hex characters
//! - Appends are serialized; readers only ever see whole snapshots

pub mod block;
pub mod chain;
pub mod digest;
pub mod listeners;
pub mod miner;
pub mod records;
pub mod types;

pub use block::Block;
pub use chain::{verify_blocks, ChainSnapshot, Ledger};
pub use digest::{HashFunction, Sha256Hash};
pub use listeners::{ListenerRegistry, ListenerResult, Subscription};
pub use records::LedgerRecord;
pub use types::{ChainIntegrityViolation, LedgerError, LedgerResult, ViolationKind};
