//! Digital-legacy core library.
//!
//! Two independent services live here:
//! - [`ledger`]: a process-local, hash-linked event ledger sealed with
//!   proof-of-work, plus an ordered listener registry.
//! - [`wallet`]: a connection state machine over an injected wallet
//!   provider (discovery, authorization, balance/network tracking).

pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod wallet;

pub use config::schema::CoreConfig;
pub use ledger::{Block, Ledger};
pub use lifecycle::Shutdown;
pub use wallet::{WalletConnectionManager, WalletState, WalletStatus};
