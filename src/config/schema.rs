//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the core
//! services. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Event ledger settings.
    pub ledger: LedgerConfig,

    /// Wallet connection manager settings.
    pub wallet: WalletConfig,

    /// JSON-RPC backed provider settings.
    pub rpc: RpcConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Event ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of leading `'0'` hex characters a sealed block hash must carry.
    pub difficulty: usize,

    /// Upper bound on a single proof-of-work search in seconds (0 = unbounded).
    pub mining_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            mining_timeout_secs: 0,
        }
    }
}

/// Wallet connection manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Vendor flag used to pick among co-installed providers (e.g. "isMetaMask").
    pub preferred_vendor: Option<String>,

    /// Timeout for non-interactive provider round-trips in seconds.
    pub request_timeout_secs: u64,

    /// Timeout for the interactive account request in seconds.
    pub connect_timeout_secs: u64,

    /// Decimal places between the smallest unit and the display unit.
    pub decimals: u8,

    /// Display symbol of the native currency.
    pub currency_symbol: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            preferred_vendor: Some("isMetaMask".to_string()),
            request_timeout_secs: 10,
            connect_timeout_secs: 120,
            decimals: 18,
            currency_symbol: "ETH".to_string(),
        }
    }
}

/// JSON-RPC provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Enable the RPC-backed wallet provider.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Interval between heartbeat polls in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            poll_interval_ms: 4000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
