//! legacy-core demo service.
//!
//! ```text
//! config (TOML, optional path argument)
//!     → logging + metrics
//!     → Services::start
//!         → Ledger (genesis) ← logging listener
//!         → WalletConnectionManager (RPC node provider when enabled)
//!     → sample account records appended and verified
//!     → wait for Ctrl-C / SIGTERM → Services::stop
//! ```

use std::path::PathBuf;
use std::time::Duration;

use legacy_core::config::load_or_default;
use legacy_core::ledger::{records, LedgerRecord};
use legacy_core::lifecycle::{signals, Services, Shutdown};
use legacy_core::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(std::env::args_os().nth(1).map(PathBuf::from))?;

    logging::init(&config.observability);
    tracing::info!("legacy-core v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        difficulty = config.ledger.difficulty,
        rpc_enabled = config.rpc.enabled,
        metrics_enabled = config.observability.metrics_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let services = Services::start(&config, &shutdown).await?;

    let _audit = services.ledger.subscribe(|block| {
        tracing::info!(
            index = block.index,
            record_type = block.record_type().unwrap_or("-"),
            hash = %block.hash,
            "Ledger entry recorded"
        );
        Ok(())
    });

    let samples = [
        LedgerRecord::user_signup("demo-user", "demo@example.com"),
        LedgerRecord::user_login("demo-user"),
        LedgerRecord::password_reset_requested("demo@example.com"),
        LedgerRecord::password_reset_completed("demo@example.com"),
    ];
    let confirmation = records::wait_for_reset_completed(
        &services.ledger,
        "demo@example.com",
        Duration::from_secs(1),
    );
    for record in &samples {
        services.ledger.append(record).await?;
    }
    let reset = confirmation.await?;
    tracing::info!(index = reset.index, "Password reset completion found");

    match services.ledger.verify() {
        Ok(()) => tracing::info!(blocks = services.ledger.len(), "Ledger verified"),
        Err(violation) => tracing::error!(error = %violation, "Ledger verification failed"),
    }

    let wallet = services.wallet.state();
    tracing::info!(
        status = ?wallet.status,
        address = ?wallet.address,
        balance = wallet.balance.as_deref().unwrap_or("-"),
        "Wallet state"
    );

    signals::shutdown_on_signal(shutdown.clone()).await;
    tracing::info!("Shutdown signal received");
    services.stop(&shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
