//! Wallet connection subsystem.
//!
//! # Data Flow
//! ```text
//! ProviderProbe::detect() (probe.rs)
//!     → WalletConnectionManager::start (manager.rs)
//!         → eth_accounts, no prompt (provider.rs, protocol.rs)
//!         → WalletState::apply (state.rs)
//!     → connect() → eth_requestAccounts → balance + network refresh (units.rs)
//!
//! Provider events (accountsChanged, chainChanged, connect, disconnect, newHeads)
//!     → event loop → WalletState::apply
//! ```
//!
//! # Invariants
//! - `Connected` iff an address is known
//! - `NotInstalled` is terminal for the manager's lifetime
//! - Listeners attached at start are removed on dispose/drop

pub mod manager;
pub mod probe;
pub mod protocol;
pub mod provider;
pub mod rpc;
pub mod state;
pub mod types;
pub mod units;

pub use manager::{ConnectOutcome, WalletConnectionManager};
pub use probe::{InjectedProviders, ProviderProbe};
pub use provider::{
    EventSink, ListenerGuard, ListenerId, ProviderEvent, ProviderEventKind, ProviderEvents,
    ProviderRequest, WalletProvider,
};
pub use rpc::RpcWalletProvider;
pub use state::{Transition, WalletState, WalletStatus};
pub use types::{chain_name, Network, ProviderError, ProviderResult, WalletError, WalletResult};
pub use units::{format_balance, format_units};
