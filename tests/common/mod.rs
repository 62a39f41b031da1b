//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use legacy_core::config::{LedgerConfig, WalletConfig};
use legacy_core::wallet::{
    EventSink, InjectedProviders, ListenerId, ProviderError, ProviderEvent, ProviderEventKind,
    ProviderEvents, ProviderRequest, ProviderResult, WalletProvider,
};

pub const ALICE: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
pub const BOB: Address = address!("0x70997970c51812dc3a010c7d01b50e0d17dc79c8");

/// 1.5 ether in wei.
pub const ONE_AND_HALF_ETH: u128 = 1_500_000_000_000_000_000;

pub fn ledger_config(difficulty: usize) -> LedgerConfig {
    LedgerConfig {
        difficulty,
        mining_timeout_secs: 0,
    }
}

pub fn wallet_config() -> WalletConfig {
    WalletConfig {
        request_timeout_secs: 2,
        connect_timeout_secs: 2,
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
struct Script {
    accounts: Vec<Address>,
    accounts_delay: Duration,
    request_accounts: ProviderResult<Vec<Address>>,
    request_accounts_delay: Duration,
    balance: ProviderResult<U256>,
    chain_id: ProviderResult<u64>,
    chain_id_delay: Duration,
    block_number: u64,
}

/// Scriptable in-memory wallet provider.
pub struct MockProvider {
    flag: &'static str,
    events: ProviderEvents,
    script: Mutex<Script>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockProvider {
    /// A provider with no authorized accounts, on mainnet, holding 1.5 ETH.
    pub fn new() -> Arc<Self> {
        Self::with_flag("isMetaMask")
    }

    pub fn with_flag(flag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            flag,
            events: ProviderEvents::new(),
            script: Mutex::new(Script {
                accounts: Vec::new(),
                accounts_delay: Duration::ZERO,
                request_accounts: Ok(vec![ALICE]),
                request_accounts_delay: Duration::ZERO,
                balance: Ok(U256::from(ONE_AND_HALF_ETH)),
                chain_id: Ok(1),
                chain_id_delay: Duration::ZERO,
                block_number: 100,
            }),
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Accounts returned by `eth_accounts` (already authorized).
    pub fn authorize(&self, accounts: Vec<Address>) {
        self.script.lock().unwrap().accounts = accounts;
    }

    /// Make `eth_accounts` answer only after `delay`.
    pub fn delay_accounts(&self, delay: Duration) {
        self.script.lock().unwrap().accounts_delay = delay;
    }

    /// Result of the next `eth_requestAccounts` prompts.
    pub fn on_request_accounts(&self, result: ProviderResult<Vec<Address>>) {
        self.script.lock().unwrap().request_accounts = result;
    }

    pub fn reject_request_accounts(&self) {
        self.on_request_accounts(Err(ProviderError::user_rejected()));
    }

    /// Simulate a user who takes `delay` to answer the prompt.
    pub fn delay_request_accounts(&self, delay: Duration) {
        self.script.lock().unwrap().request_accounts_delay = delay;
    }

    pub fn set_balance(&self, result: ProviderResult<U256>) {
        self.script.lock().unwrap().balance = result;
    }

    pub fn set_chain_id(&self, result: ProviderResult<u64>) {
        self.script.lock().unwrap().chain_id = result;
    }

    /// Make `eth_chainId` answer only after `delay`.
    pub fn delay_chain_id(&self, delay: Duration) {
        self.script.lock().unwrap().chain_id_delay = delay;
    }

    /// Push an event to registered listeners. Returns how many received it.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.events.emit(event)
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    /// Number of requests issued for `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn probe(self: &Arc<Self>) -> InjectedProviders {
        InjectedProviders::new().with_provider(self.clone())
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn has_flag(&self, flag: &str) -> bool {
        self.flag == flag
    }

    async fn request(&self, request: ProviderRequest) -> ProviderResult<Value> {
        *self.calls.lock().unwrap().entry(request.method()).or_insert(0) += 1;
        let script = self.script.lock().unwrap().clone();

        match request {
            ProviderRequest::Accounts => {
                if !script.accounts_delay.is_zero() {
                    tokio::time::sleep(script.accounts_delay).await;
                }
                let accounts = self.script.lock().unwrap().accounts.clone();
                Ok(accounts_json(&accounts))
            }
            ProviderRequest::RequestAccounts => {
                if !script.request_accounts_delay.is_zero() {
                    tokio::time::sleep(script.request_accounts_delay).await;
                }
                let accounts = script.request_accounts?;
                self.script.lock().unwrap().accounts = accounts.clone();
                Ok(accounts_json(&accounts))
            }
            ProviderRequest::Balance(_) => script.balance.map(|wei| json!(format!("0x{:x}", wei))),
            ProviderRequest::ChainId => {
                if !script.chain_id_delay.is_zero() {
                    tokio::time::sleep(script.chain_id_delay).await;
                }
                script.chain_id.map(|id| json!(format!("0x{:x}", id)))
            }
            ProviderRequest::BlockNumber => Ok(json!(format!("0x{:x}", script.block_number))),
        }
    }

    fn add_listener(&self, kind: ProviderEventKind, sink: EventSink) -> ListenerId {
        self.events.add(kind, sink)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.events.remove(id)
    }
}

fn accounts_json(accounts: &[Address]) -> Value {
    json!(accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>())
}

/// Poll `condition` until it holds or `limit` passes.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await `future`, failing the test if it takes longer than `limit`.
pub async fn within<F: Future>(limit: Duration, future: F) -> F::Output {
    tokio::time::timeout(limit, future)
        .await
        .expect("operation did not finish in time")
}
