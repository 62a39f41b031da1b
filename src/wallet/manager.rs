//! Wallet connection manager.
//!
//! Wraps a discovered provider in the [`WalletState`] machine. All state
//! lives in one `watch` channel; every change goes through
//! [`WalletState::apply`].
//!
//! # Lifecycle
//! ```text
//! start(probe)
//!     → no provider: NotInstalled, nothing attached
//!     → provider: attach listeners (ListenerGuard)
//!                 → eth_accounts (no prompt) → Connected | Disconnected
//!                 → spawn event loop owning the guard
//! dispose() / drop
//!     → cancel event loop → guard drops → listeners removed
//! ```
//! Dropping `start` before it resolves drops the guard as well, so no exit
//! path leaves listeners attached.
//!
//! # Ordering
//! A `connect()` resolving and an `accountsChanged` event arriving at the
//! same time are not sequenced: whichever transition is applied last wins.
//!
//! Events apply their transition in arrival order. The provider reads they
//! trigger (balance, network, session) run as separate tasks, so a slow
//! read never holds back the events queued behind it.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::WalletConfig;
use crate::observability::metrics;
use crate::resilience::bounded;
use crate::wallet::probe::ProviderProbe;
use crate::wallet::protocol::{parse_accounts, parse_quantity, parse_u64};
use crate::wallet::provider::{ListenerGuard, ProviderEvent, ProviderRequest, WalletProvider};
use crate::wallet::state::{Transition, WalletState, WalletStatus};
use crate::wallet::types::{Network, WalletError, WalletResult};
use crate::wallet::units::format_units;

/// Result of a [`WalletConnectionManager::connect`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The user authorized `address`. Refresh failures are reported but do
    /// not undo the connection.
    Connected {
        address: Address,
        refresh_failures: Vec<WalletError>,
    },
    /// Another `connect()` is already waiting on the user; no request issued.
    AlreadyConnecting,
    /// An account is already authorized; no request issued.
    AlreadyConnected(Address),
}

struct Shared {
    provider: Option<Arc<dyn WalletProvider>>,
    config: WalletConfig,
    state: watch::Sender<WalletState>,
}

impl Shared {
    fn provider(&self) -> WalletResult<&Arc<dyn WalletProvider>> {
        self.provider.as_ref().ok_or(WalletError::ProviderAbsent)
    }

    fn snapshot(&self) -> WalletState {
        self.state.borrow().clone()
    }

    fn transition(&self, transition: Transition) -> bool {
        let label = transition_label(&transition);
        let changed = self.state.send_if_modified(|state| state.apply(transition));
        if changed {
            let state = self.state.borrow();
            metrics::record_wallet_status(state.status.metric_code());
            tracing::debug!(
                transition = label,
                status = ?state.status,
                address = ?state.address,
                "Wallet state changed"
            );
        }
        changed
    }

    /// One provider round-trip, bounded by `limit`.
    async fn request(&self, request: ProviderRequest, limit: Duration) -> WalletResult<Value> {
        let provider = self.provider()?;
        let operation = request.method();
        match bounded(operation, limit, provider.request(request)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_user_rejected() => Err(WalletError::UserRejected(e.message)),
            Ok(Err(e)) => Err(WalletError::Provider(e)),
            Err(elapsed) => Err(WalletError::Timeout {
                operation,
                limit: elapsed.limit,
            }),
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Adopt already-authorized accounts without prompting.
    async fn restore_session(&self) -> Vec<WalletError> {
        let accounts = self
            .request(ProviderRequest::Accounts, self.request_timeout())
            .await
            .and_then(|value| parse_accounts(&value));

        match accounts {
            Ok(accounts) => {
                self.transition(Transition::SessionRead(accounts));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read authorized accounts");
                self.transition(Transition::SessionRead(Vec::new()));
                return vec![e];
            }
        }

        if self.snapshot().is_connected() {
            self.refresh_all().await
        } else {
            Vec::new()
        }
    }

    async fn refresh_all(&self) -> Vec<WalletError> {
        let (balance, network) = tokio::join!(self.refresh_balance(), self.refresh_network());
        [balance.err(), network.err()].into_iter().flatten().collect()
    }

    async fn refresh_balance(&self) -> WalletResult<String> {
        let address = match self.snapshot() {
            WalletState {
                status: WalletStatus::NotInstalled,
                ..
            } => return Err(WalletError::ProviderAbsent),
            WalletState {
                address: Some(address),
                ..
            } => address,
            _ => return Err(WalletError::NotConnected),
        };

        let wei = self
            .request(ProviderRequest::Balance(address), self.request_timeout())
            .await
            .and_then(|value| parse_quantity(&value));

        match wei {
            Ok(wei) => {
                let balance = format_units(wei, self.config.decimals);
                self.transition(Transition::BalanceRefreshed {
                    address,
                    balance: balance.clone(),
                });
                Ok(balance)
            }
            Err(e) => {
                metrics::record_refresh_failure("balance");
                tracing::warn!(address = %address, error = %e, "Balance refresh failed");
                Err(e.into_refresh("balance"))
            }
        }
    }

    async fn refresh_network(&self) -> WalletResult<Network> {
        let chain_id = self
            .request(ProviderRequest::ChainId, self.request_timeout())
            .await
            .and_then(|value| parse_u64(&value));

        match chain_id {
            Ok(chain_id) => {
                let network = Network::from_chain_id(chain_id);
                self.transition(Transition::NetworkRefreshed(network.clone()));
                Ok(network)
            }
            Err(WalletError::ProviderAbsent) => Err(WalletError::ProviderAbsent),
            Err(e) => {
                metrics::record_refresh_failure("network");
                tracing::warn!(error = %e, "Network refresh failed");
                Err(e.into_refresh("network"))
            }
        }
    }

    /// Apply the event's transition and name the read it calls for.
    fn handle_event(&self, event: ProviderEvent) -> Option<FollowUp> {
        metrics::record_provider_event(event.kind().name());
        tracing::debug!(event = event.kind().name(), "Provider event");

        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.transition(Transition::AccountsResolved(accounts));
                self.snapshot().is_connected().then_some(FollowUp::Balance)
            }
            ProviderEvent::ChainChanged(_) => Some(FollowUp::Network),
            // A pending prompt owns the Connecting state; re-reading the
            // session there would drop it back to Disconnected.
            ProviderEvent::Connect { .. } => {
                (self.snapshot().status == WalletStatus::Disconnected).then_some(FollowUp::Session)
            }
            ProviderEvent::Disconnect(reason) => {
                tracing::info!(code = reason.code, reason = %reason.message, "Provider disconnected");
                self.transition(Transition::ProviderDisconnected);
                None
            }
            ProviderEvent::NewHeads(height) => {
                self.transition(Transition::NewHead(height));
                None
            }
        }
    }

    async fn follow_up(self: Arc<Self>, work: FollowUp) {
        match work {
            FollowUp::Balance => {
                let _ = self.refresh_balance().await;
            }
            FollowUp::Network => {
                let _ = self.refresh_network().await;
            }
            FollowUp::Session => {
                let _ = self.restore_session().await;
            }
        }
    }
}

/// Provider read scheduled by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUp {
    Balance,
    Network,
    Session,
}

fn transition_label(transition: &Transition) -> &'static str {
    match transition {
        Transition::ProviderMissing => "provider_missing",
        Transition::AccountsResolved(_) => "accounts_resolved",
        Transition::SessionRead(_) => "session_read",
        Transition::ConnectRequested => "connect_requested",
        Transition::ConnectFailed => "connect_failed",
        Transition::ConnectAbandoned => "connect_abandoned",
        Transition::ProviderDisconnected => "provider_disconnected",
        Transition::BalanceRefreshed { .. } => "balance_refreshed",
        Transition::NetworkRefreshed(_) => "network_refreshed",
        Transition::NewHead(_) => "new_head",
    }
}

/// Falls back to `Disconnected` if a `connect()` is abandoned mid-flight
/// and nothing else resolved the prompt meanwhile.
struct ConnectingGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Connect abandoned before resolving");
            self.shared.transition(Transition::ConnectAbandoned);
        }
    }
}

/// Per-session owner of a wallet provider connection.
pub struct WalletConnectionManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    start_failures: Vec<WalletError>,
}

impl WalletConnectionManager {
    /// Discover a provider and restore any already-authorized session.
    ///
    /// Never prompts the user. Failures while reading the session leave the
    /// manager `Disconnected`; balance and network failures keep the account.
    /// Either kind is available from [`WalletConnectionManager::start_failures`].
    pub async fn start(probe: &dyn ProviderProbe, config: WalletConfig) -> Self {
        let Some(provider) = probe.detect() else {
            tracing::info!("No wallet provider found");
            let (state, _) = watch::channel(WalletState::not_installed());
            metrics::record_wallet_status(WalletStatus::NotInstalled.metric_code());
            return Self {
                shared: Arc::new(Shared {
                    provider: None,
                    config,
                    state,
                }),
                cancel: CancellationToken::new(),
                task: None,
                start_failures: Vec::new(),
            };
        };

        let (sink, events) = mpsc::unbounded_channel();
        let guard = ListenerGuard::attach(provider.clone(), sink);
        let (state, _) = watch::channel(WalletState::disconnected());
        let shared = Arc::new(Shared {
            provider: Some(provider),
            config,
            state,
        });
        metrics::record_wallet_status(WalletStatus::Disconnected.metric_code());

        let failures = shared.restore_session().await;
        let snapshot = shared.snapshot();
        tracing::info!(
            status = ?snapshot.status,
            address = ?snapshot.address,
            refresh_failures = failures.len(),
            "Wallet manager started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_events(shared.clone(), events, guard, cancel.clone()));

        Self {
            shared,
            cancel,
            task: Some(task),
            start_failures: failures,
        }
    }

    /// Reads that failed while restoring the session in `start`. Refresh
    /// failures are [`WalletError::Refresh`] and usually retryable.
    pub fn start_failures(&self) -> &[WalletError] {
        &self.start_failures
    }

    /// Ask the user to authorize an account.
    pub async fn connect(&self) -> WalletResult<ConnectOutcome> {
        self.shared.provider()?;

        let mut current = None;
        let started = self.shared.state.send_if_modified(|state| {
            if state.status == WalletStatus::Disconnected {
                state.apply(Transition::ConnectRequested)
            } else {
                current = Some((state.status, state.address));
                false
            }
        });

        if !started {
            return match current {
                Some((WalletStatus::Connecting, _)) => {
                    tracing::debug!("Connect already in progress");
                    Ok(ConnectOutcome::AlreadyConnecting)
                }
                Some((WalletStatus::Connected, Some(address))) => {
                    Ok(ConnectOutcome::AlreadyConnected(address))
                }
                _ => Err(WalletError::ProviderAbsent),
            };
        }
        metrics::record_wallet_status(WalletStatus::Connecting.metric_code());
        tracing::info!("Requesting wallet authorization");

        let mut guard = ConnectingGuard {
            shared: &self.shared,
            armed: true,
        };
        let limit = Duration::from_secs(self.shared.config.connect_timeout_secs);
        let accounts = self
            .shared
            .request(ProviderRequest::RequestAccounts, limit)
            .await
            .and_then(|value| parse_accounts(&value));
        guard.armed = false;

        match accounts {
            Ok(accounts) if !accounts.is_empty() => {
                let address = accounts[0];
                self.shared.transition(Transition::AccountsResolved(accounts));
                tracing::info!(address = %address, "Wallet connected");
                let refresh_failures = self.shared.refresh_all().await;
                Ok(ConnectOutcome::Connected {
                    address,
                    refresh_failures,
                })
            }
            Ok(_) => {
                self.shared.transition(Transition::ConnectFailed);
                tracing::info!("Wallet authorized no accounts");
                Err(WalletError::UserRejected("no accounts authorized".to_string()))
            }
            Err(e) => {
                self.shared.transition(Transition::ConnectFailed);
                tracing::warn!(error = %e, "Wallet connection failed");
                Err(e)
            }
        }
    }

    /// Re-read the balance of the connected account. On failure the previous
    /// value is kept and a retryable [`WalletError::Refresh`] is returned.
    pub async fn refresh_balance(&self) -> WalletResult<String> {
        self.shared.refresh_balance().await
    }

    /// Re-read the provider's network.
    pub async fn refresh_network(&self) -> WalletResult<Network> {
        self.shared.refresh_network().await
    }

    /// Current state.
    pub fn state(&self) -> WalletState {
        self.shared.snapshot()
    }

    pub fn status(&self) -> WalletStatus {
        self.shared.state.borrow().status
    }

    pub fn address(&self) -> Option<Address> {
        self.shared.state.borrow().address
    }

    /// Receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<WalletState> {
        self.shared.state.subscribe()
    }

    /// Stop the event loop and detach from the provider.
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Wallet event loop ended abnormally");
            }
        }
        tracing::info!("Wallet manager disposed");
    }
}

impl Drop for WalletConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for WalletConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnectionManager")
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

async fn run_events(
    shared: Arc<Shared>,
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    guard: ListenerGuard,
    cancel: CancellationToken,
) {
    let _guard = guard;
    let mut reads = JoinSet::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(_) = reads.join_next(), if !reads.is_empty() => continue,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if let Some(work) = shared.handle_event(event) {
            reads.spawn(shared.clone().follow_up(work));
        }
    }
    reads.abort_all();
    tracing::debug!("Wallet event loop stopped");
}
