//! Configuration for the ledger and wallet services.
//!
//! ```text
//! path argument | LEGACY_CORE_CONFIG | defaults
//!     → loader.rs      TOML → CoreConfig
//!     → validation.rs  difficulty bounds, timeouts, URLs (all errors at once)
//!     → [ledger] → Ledger::new     [wallet] → WalletConnectionManager::start
//!       [rpc] → RpcWalletProvider  [observability] → logging, metrics
//! ```
//!
//! Every section and field has a default, so an empty file is valid.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use schema::CoreConfig;
pub use schema::LedgerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RpcConfig;
pub use schema::WalletConfig;
