//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the ledger
//! - Discover a wallet provider (RPC node when enabled) and start the manager
//! - Start the RPC heartbeat poller
//!
//! # Design Decisions
//! - Fail fast: an invalid config is fatal
//! - Subsystems initialize in order, not concurrently
//! - Shutdown runs in reverse: poller, wallet, then ledger

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::CoreConfig;
use crate::ledger::{Ledger, LedgerError};
use crate::lifecycle::Shutdown;
use crate::wallet::{InjectedProviders, RpcWalletProvider, WalletConnectionManager, WalletError};

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", format_errors(.0))]
    Config(Vec<ValidationError>),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("wallet provider: {0}")]
    Wallet(#[from] WalletError),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Running services, owned by the caller.
pub struct Services {
    pub ledger: Arc<Ledger>,
    pub wallet: WalletConnectionManager,
    poller: Option<JoinHandle<()>>,
}

impl Services {
    /// Bring every subsystem up.
    pub async fn start(config: &CoreConfig, shutdown: &Shutdown) -> Result<Self, StartupError> {
        validate_config(config).map_err(StartupError::Config)?;

        let ledger = Arc::new(Ledger::new(&config.ledger)?);

        let mut probe = InjectedProviders::new().prefer(config.wallet.preferred_vendor.clone());
        let mut poller = None;
        if config.rpc.enabled {
            let rpc = Arc::new(RpcWalletProvider::new(config.rpc.clone())?);
            poller = Some(rpc.clone().watch(shutdown.subscribe()));
            probe = probe.with_provider(rpc);
        }

        let wallet = WalletConnectionManager::start(&probe, config.wallet.clone()).await;
        for failure in wallet.start_failures() {
            tracing::warn!(
                error = %failure,
                retryable = failure.is_retryable(),
                "Wallet session restored with errors"
            );
        }

        tracing::info!(
            difficulty = ledger.difficulty(),
            wallet_status = ?wallet.status(),
            rpc_enabled = config.rpc.enabled,
            "Services started"
        );

        Ok(Self {
            ledger,
            wallet,
            poller,
        })
    }

    /// Stop producers first, then release provider listeners.
    pub async fn stop(self, shutdown: &Shutdown) {
        shutdown.trigger();
        if let Some(poller) = self.poller {
            if tokio::time::timeout(Duration::from_secs(5), poller).await.is_err() {
                tracing::warn!("RPC poller did not stop in time");
            }
        }
        self.wallet.dispose().await;
        self.ledger.shutdown();
        tracing::info!("Services stopped");
    }
}
