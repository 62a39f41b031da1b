//! JSON-RPC node backed wallet provider.
//!
//! # Responsibilities
//! - Forward provider requests to a JSON-RPC endpoint (primary + failovers)
//! - Bound every call with a timeout
//! - Synthesize provider events by polling: `newHeads` on height increase,
//!   `chainChanged` / `accountsChanged` on change, `disconnect` / `connect`
//!   when the node goes away or comes back
//!
//! Node-managed accounts are already authorized, so `eth_requestAccounts`
//! is served by `eth_accounts`.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::RpcConfig;
use crate::resilience::calculate_backoff;
use crate::wallet::protocol::{parse_accounts, parse_u64};
use crate::wallet::provider::{
    EventSink, ListenerId, ProviderEvent, ProviderEventKind, ProviderEvents, ProviderRequest,
    WalletProvider,
};
use crate::wallet::types::{ProviderError, ProviderResult, WalletError, WalletResult};

/// Vendor flag carried by this provider.
pub const RPC_VENDOR_FLAG: &str = "isRpcNode";

/// Wallet provider speaking to JSON-RPC nodes with failover.
pub struct RpcWalletProvider {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: RpcConfig,
    timeout_duration: Duration,
    events: ProviderEvents,
}

/// What the poller saw last time.
#[derive(Debug, Default)]
struct Observed {
    reachable: Option<bool>,
    chain_id: Option<u64>,
    accounts: Option<Vec<Address>>,
    block_number: Option<u64>,
}

impl RpcWalletProvider {
    /// Create a provider. No network traffic happens here.
    pub fn new(config: RpcConfig) -> WalletResult<Self> {
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            WalletError::Protocol(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url)) as Arc<dyn Provider + Send + Sync>
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse::<url::Url>() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = providers.len() - 1,
            "RPC wallet provider initialized"
        );

        Ok(Self {
            providers,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            config,
            events: ProviderEvents::new(),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Number of registered event listeners.
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    async fn call(&self, method: &'static str, params: Value) -> ProviderResult<Value> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.client().request::<_, Value>(method, params.clone());
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    // The node answered; another node would not answer differently.
                    if let Some(error) = node_error(&e) {
                        tracing::debug!(provider_idx = i, method, code = error.code, "RPC error response");
                        return Err(error);
                    }
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ProviderError::new(
            ProviderError::DISCONNECTED,
            format!("All RPC providers failed for {}", method),
        ))
    }

    /// Poll once and emit events for whatever changed.
    async fn poll_once(&self, observed: &mut Observed) -> WalletResult<()> {
        let height = match self.request(ProviderRequest::BlockNumber).await {
            Ok(value) => parse_u64(&value)?,
            Err(e) => {
                if observed.reachable != Some(false) {
                    observed.reachable = Some(false);
                    self.events.emit(ProviderEvent::Disconnect(e.clone()));
                }
                return Err(WalletError::Provider(e));
            }
        };

        let chain_id = parse_u64(&self.request(ProviderRequest::ChainId).await?)?;
        let accounts = parse_accounts(&self.request(ProviderRequest::Accounts).await?)?;

        if observed.reachable != Some(true) {
            observed.reachable = Some(true);
            self.events.emit(ProviderEvent::Connect { chain_id });
        }
        if observed.chain_id.is_some_and(|previous| previous != chain_id) {
            self.events.emit(ProviderEvent::ChainChanged(chain_id));
        }
        if observed.accounts.as_ref().is_some_and(|previous| *previous != accounts) {
            self.events.emit(ProviderEvent::AccountsChanged(accounts.clone()));
        }
        if observed.block_number.map_or(true, |previous| height > previous) {
            self.events.emit(ProviderEvent::NewHeads(height));
            observed.block_number = Some(height);
        }

        observed.chain_id = Some(chain_id);
        observed.accounts = Some(accounts);
        Ok(())
    }

    /// Spawn the heartbeat poller. It stops when `cancel` fires.
    pub fn watch(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "RPC poller starting");
            let mut observed = Observed::default();
            let mut failures: u32 = 0;

            loop {
                match self.poll_once(&mut observed).await {
                    Ok(()) => failures = 0,
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        tracing::debug!(failures, error = %e, "RPC poll failed");
                    }
                }

                let delay = if failures == 0 {
                    interval
                } else {
                    calculate_backoff(failures, interval, interval * 8)
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }
            tracing::info!("RPC poller stopped");
        })
    }
}

/// The JSON-RPC error object carried by `error`, if the transport succeeded.
fn node_error(error: &TransportError) -> Option<ProviderError> {
    error
        .as_error_resp()
        .map(|payload| ProviderError::new(payload.code, payload.message.to_string()))
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    fn has_flag(&self, flag: &str) -> bool {
        flag == RPC_VENDOR_FLAG
    }

    async fn request(&self, request: ProviderRequest) -> ProviderResult<Value> {
        let request = match request {
            ProviderRequest::RequestAccounts => ProviderRequest::Accounts,
            other => other,
        };
        self.call(request.method(), request.params()).await
    }

    fn add_listener(&self, kind: ProviderEventKind, sink: EventSink) -> ListenerId {
        self.events.add(kind, sink)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.events.remove(id)
    }
}

impl std::fmt::Debug for RpcWalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWalletProvider")
            .field("rpc_url", &self.config.rpc_url)
            .field("failovers", &self.config.failover_urls.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
