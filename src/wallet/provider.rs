//! Injected wallet provider interface.
//!
//! This is the fixed external contract the manager speaks: one `request`
//! method taking EIP-1193 style calls, plus subscribable events. Providers
//! embed [`ProviderEvents`] for listener bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::wallet::types::{ProviderError, ProviderResult};

/// Calls the manager issues against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRequest {
    /// Already-authorized accounts, never prompts (`eth_accounts`).
    Accounts,
    /// Ask the user to authorize accounts (`eth_requestAccounts`).
    RequestAccounts,
    /// Native balance in smallest units (`eth_getBalance`).
    Balance(Address),
    /// Current chain id (`eth_chainId`).
    ChainId,
    /// Latest block height (`eth_blockNumber`).
    BlockNumber,
}

impl ProviderRequest {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            ProviderRequest::Accounts => "eth_accounts",
            ProviderRequest::RequestAccounts => "eth_requestAccounts",
            ProviderRequest::Balance(_) => "eth_getBalance",
            ProviderRequest::ChainId => "eth_chainId",
            ProviderRequest::BlockNumber => "eth_blockNumber",
        }
    }

    /// JSON-RPC positional params.
    pub fn params(&self) -> Value {
        match self {
            ProviderRequest::Balance(address) => json!([address, "latest"]),
            _ => json!([]),
        }
    }
}

/// Event names a provider can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
    Connect,
    Disconnect,
    NewHeads,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 5] = [
        ProviderEventKind::AccountsChanged,
        ProviderEventKind::ChainChanged,
        ProviderEventKind::Connect,
        ProviderEventKind::Disconnect,
        ProviderEventKind::NewHeads,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderEventKind::AccountsChanged => "accountsChanged",
            ProviderEventKind::ChainChanged => "chainChanged",
            ProviderEventKind::Connect => "connect",
            ProviderEventKind::Disconnect => "disconnect",
            ProviderEventKind::NewHeads => "newHeads",
        }
    }
}

/// An event pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Connect { chain_id: u64 },
    Disconnect(ProviderError),
    /// New-block heartbeat carrying the block height.
    NewHeads(u64),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => ProviderEventKind::ChainChanged,
            ProviderEvent::Connect { .. } => ProviderEventKind::Connect,
            ProviderEvent::Disconnect(_) => ProviderEventKind::Disconnect,
            ProviderEvent::NewHeads(_) => ProviderEventKind::NewHeads,
        }
    }
}

/// Where a provider delivers events for one listener.
pub type EventSink = mpsc::UnboundedSender<ProviderEvent>;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// An injected wallet provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Vendor-identifying flag, e.g. `"isMetaMask"`.
    fn has_flag(&self, flag: &str) -> bool;

    /// Issue one request.
    async fn request(&self, request: ProviderRequest) -> ProviderResult<Value>;

    /// Start delivering `kind` events to `sink`.
    fn add_listener(&self, kind: ProviderEventKind, sink: EventSink) -> ListenerId;

    /// Stop delivering to a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

/// Listener bookkeeping shared by provider implementations.
#[derive(Debug, Default)]
pub struct ProviderEvents {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, ProviderEventKind, EventSink)>>,
}

impl ProviderEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: ProviderEventKind, sink: EventSink) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, kind, sink));
        id
    }

    pub fn remove(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener, _, _)| *listener != id);
    }

    /// Deliver `event` to every listener of its kind. Returns how many
    /// listeners received it.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        let kind = event.kind();
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .filter(|(_, _, sink)| sink.send(event.clone()).is_ok())
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Listeners registered on a provider, removed when the guard drops.
pub struct ListenerGuard {
    provider: Arc<dyn WalletProvider>,
    ids: Vec<ListenerId>,
}

impl ListenerGuard {
    /// Subscribe `sink` to every provider event kind.
    pub fn attach(provider: Arc<dyn WalletProvider>, sink: EventSink) -> Self {
        let ids = ProviderEventKind::ALL
            .iter()
            .map(|kind| provider.add_listener(*kind, sink.clone()))
            .collect();
        Self { provider, ids }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.provider.remove_listener(id);
        }
        tracing::debug!("Provider listeners removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_form() {
        let address = Address::ZERO;
        let request = ProviderRequest::Balance(address);
        assert_eq!(request.method(), "eth_getBalance");
        assert_eq!(
            request.params(),
            json!(["0x0000000000000000000000000000000000000000", "latest"])
        );
        assert_eq!(ProviderRequest::Accounts.params(), json!([]));
    }

    #[test]
    fn test_emit_routes_by_kind() {
        let events = ProviderEvents::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        events.add(ProviderEventKind::NewHeads, tx.clone());
        let chain_listener = events.add(ProviderEventKind::ChainChanged, tx);

        assert_eq!(events.emit(ProviderEvent::NewHeads(7)), 1);
        assert_eq!(rx.try_recv().unwrap(), ProviderEvent::NewHeads(7));
        assert_eq!(events.emit(ProviderEvent::AccountsChanged(vec![])), 0);

        events.remove(chain_listener);
        assert_eq!(events.listener_count(), 1);
        assert_eq!(events.emit(ProviderEvent::ChainChanged(1)), 0);
    }

    #[test]
    fn test_closed_sink_not_counted() {
        let events = ProviderEvents::new();
        let (tx, rx) = mpsc::unbounded_channel();
        events.add(ProviderEventKind::NewHeads, tx);
        drop(rx);
        assert_eq!(events.emit(ProviderEvent::NewHeads(1)), 0);
    }
}
