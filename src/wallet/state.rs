//! Wallet connection state and its transition function.
//!
//! # States
//! - NotInstalled: no provider in the host environment (terminal)
//! - Disconnected: provider present, no authorized account
//! - Connecting: interactive authorization in flight
//! - Connected: an account is authorized
//!
//! # State Transitions
//! ```text
//! (start) → NotInstalled: ProviderMissing
//! Disconnected → Connecting: ConnectRequested
//! any installed → Connected: AccountsResolved(non-empty), SessionRead(non-empty)
//! any installed → Disconnected: AccountsResolved([]), ConnectFailed, ProviderDisconnected
//! Disconnected | Connected → Disconnected: SessionRead([])
//! Connecting → Disconnected: ConnectAbandoned
//! ```
//! An empty `eth_accounts` read says nothing about a prompt still in flight,
//! so `SessionRead([])` leaves `Connecting` alone.
//! Balance, network and block height updates never change `status`.

use alloy::primitives::Address;
use serde::Serialize;

use crate::wallet::types::Network;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WalletStatus {
    NotInstalled,
    Disconnected,
    Connecting,
    Connected,
}

impl WalletStatus {
    /// Value exported on the `wallet_status` gauge.
    pub fn metric_code(&self) -> u8 {
        match self {
            WalletStatus::NotInstalled => 0,
            WalletStatus::Disconnected => 1,
            WalletStatus::Connecting => 2,
            WalletStatus::Connected => 3,
        }
    }
}

/// Inputs to [`WalletState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    ProviderMissing,
    /// Account list from `eth_accounts`, `eth_requestAccounts` or `accountsChanged`.
    AccountsResolved(Vec<Address>),
    /// Non-interactive `eth_accounts` read.
    SessionRead(Vec<Address>),
    ConnectRequested,
    ConnectFailed,
    /// A pending `connect()` was dropped before it resolved.
    ConnectAbandoned,
    ProviderDisconnected,
    BalanceRefreshed { address: Address, balance: String },
    NetworkRefreshed(Network),
    NewHead(u64),
}

/// Everything the UI reads about the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletState {
    pub status: WalletStatus,
    /// Set iff `status == Connected`.
    pub address: Option<Address>,
    /// Exact decimal balance of `address` in display units.
    pub balance: Option<String>,
    pub network: Option<Network>,
    /// Latest heartbeat block height.
    pub block_number: Option<u64>,
}

impl WalletState {
    pub fn not_installed() -> Self {
        Self {
            status: WalletStatus::NotInstalled,
            ..Self::disconnected()
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: WalletStatus::Disconnected,
            address: None,
            balance: None,
            network: None,
            block_number: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == WalletStatus::Connected
    }

    /// `address` is present exactly when connected, and a balance only
    /// exists for a present address.
    pub fn invariant_holds(&self) -> bool {
        (self.address.is_some() == self.is_connected())
            && (self.address.is_some() || self.balance.is_none())
    }

    /// Apply one transition. Returns whether anything changed.
    pub fn apply(&mut self, transition: Transition) -> bool {
        if transition == Transition::ProviderMissing {
            let changed = *self != Self::not_installed();
            *self = Self::not_installed();
            return changed;
        }
        if self.status == WalletStatus::NotInstalled {
            return false;
        }

        let before = self.clone();
        match transition {
            Transition::ProviderMissing => {}
            Transition::AccountsResolved(accounts) => match accounts.first() {
                Some(first) => {
                    if self.address != Some(*first) {
                        self.balance = None;
                    }
                    self.address = Some(*first);
                    self.status = WalletStatus::Connected;
                }
                None => self.clear_account(),
            },
            Transition::SessionRead(accounts) => {
                if !accounts.is_empty() {
                    return self.apply(Transition::AccountsResolved(accounts));
                }
                if self.status != WalletStatus::Connecting {
                    self.clear_account();
                }
            }
            Transition::ConnectRequested => {
                if self.status == WalletStatus::Disconnected {
                    self.status = WalletStatus::Connecting;
                }
            }
            Transition::ConnectFailed | Transition::ProviderDisconnected => self.clear_account(),
            Transition::ConnectAbandoned => {
                if self.status == WalletStatus::Connecting {
                    self.clear_account();
                }
            }
            Transition::BalanceRefreshed { address, balance } => {
                if self.is_connected() && self.address == Some(address) {
                    self.balance = Some(balance);
                }
            }
            Transition::NetworkRefreshed(network) => self.network = Some(network),
            Transition::NewHead(height) => self.block_number = Some(height),
        }

        debug_assert!(self.invariant_holds(), "wallet state invariant broken: {:?}", self);
        *self != before
    }

    fn clear_account(&mut self) {
        self.status = WalletStatus::Disconnected;
        self.address = None;
        self.balance = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ALICE: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    const BOB: Address = address!("0x70997970c51812dc3a010c7d01b50e0d17dc79c8");

    fn connected(to: Address) -> WalletState {
        let mut state = WalletState::disconnected();
        state.apply(Transition::AccountsResolved(vec![to]));
        state.apply(Transition::BalanceRefreshed {
            address: to,
            balance: "1.0".to_string(),
        });
        state
    }

    #[test]
    fn test_not_installed_is_terminal() {
        let mut state = WalletState::not_installed();
        assert!(!state.apply(Transition::AccountsResolved(vec![ALICE])));
        assert!(!state.apply(Transition::ConnectRequested));
        assert!(!state.apply(Transition::NewHead(5)));
        assert_eq!(state, WalletState::not_installed());
    }

    #[test]
    fn test_connect_cycle() {
        let mut state = WalletState::disconnected();
        assert!(state.apply(Transition::ConnectRequested));
        assert_eq!(state.status, WalletStatus::Connecting);
        assert!(state.address.is_none());

        // A second request while connecting changes nothing.
        assert!(!state.apply(Transition::ConnectRequested));

        state.apply(Transition::AccountsResolved(vec![ALICE, BOB]));
        assert_eq!(state.status, WalletStatus::Connected);
        assert_eq!(state.address, Some(ALICE));
    }

    #[test]
    fn test_connect_failed_clears_account() {
        let mut state = WalletState::disconnected();
        state.apply(Transition::ConnectRequested);
        state.apply(Transition::ConnectFailed);
        assert_eq!(state, WalletState::disconnected());
    }

    #[test]
    fn test_abandon_only_reverts_connecting() {
        let mut state = WalletState::disconnected();
        state.apply(Transition::ConnectRequested);
        assert!(state.apply(Transition::ConnectAbandoned));
        assert_eq!(state, WalletState::disconnected());

        // An account adopted while the prompt was open survives the abandon.
        let mut state = WalletState::disconnected();
        state.apply(Transition::ConnectRequested);
        state.apply(Transition::AccountsResolved(vec![BOB]));
        assert!(!state.apply(Transition::ConnectAbandoned));
        assert_eq!(state.status, WalletStatus::Connected);
        assert_eq!(state.address, Some(BOB));
    }

    #[test]
    fn test_empty_session_read_keeps_pending_prompt() {
        let mut state = WalletState::disconnected();
        state.apply(Transition::ConnectRequested);
        assert!(!state.apply(Transition::SessionRead(Vec::new())));
        assert_eq!(state.status, WalletStatus::Connecting);

        assert!(state.apply(Transition::SessionRead(vec![ALICE])));
        assert_eq!(state.address, Some(ALICE));

        assert!(state.apply(Transition::SessionRead(Vec::new())));
        assert_eq!(state, WalletState::disconnected());
    }

    #[test]
    fn test_empty_accounts_disconnects() {
        let mut state = connected(ALICE);
        assert_eq!(state.balance.as_deref(), Some("1.0"));

        state.apply(Transition::AccountsResolved(vec![]));
        assert_eq!(state.status, WalletStatus::Disconnected);
        assert!(state.address.is_none());
        assert!(state.balance.is_none());
    }

    #[test]
    fn test_account_switch_drops_stale_balance() {
        let mut state = connected(ALICE);
        state.apply(Transition::AccountsResolved(vec![BOB]));
        assert_eq!(state.address, Some(BOB));
        assert!(state.balance.is_none());

        // Late balance for the previous account is ignored.
        assert!(!state.apply(Transition::BalanceRefreshed {
            address: ALICE,
            balance: "9.0".to_string(),
        }));
    }

    #[test]
    fn test_network_and_heartbeat_keep_status() {
        let mut state = WalletState::disconnected();
        state.apply(Transition::NetworkRefreshed(Network::from_chain_id(1)));
        state.apply(Transition::NewHead(19_000_000));
        assert_eq!(state.status, WalletStatus::Disconnected);
        assert_eq!(state.block_number, Some(19_000_000));
        assert_eq!(state.network.unwrap().name, "homestead");
    }

    #[test]
    fn test_provider_missing_resets() {
        let mut state = connected(ALICE);
        assert!(state.apply(Transition::ProviderMissing));
        assert_eq!(state, WalletState::not_installed());
    }
}
