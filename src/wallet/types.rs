//! Wallet error definitions and network naming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error object returned by a provider request (EIP-1193 shape).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested method/account has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the requested method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == Self::USER_REJECTED
    }
}

/// Result type for raw provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by the wallet connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// No injected provider was found.
    #[error("No wallet provider installed")]
    ProviderAbsent,

    /// The interactive authorization was declined.
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// A provider round-trip did not complete in time.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    /// Balance or network read failed; the previous value was kept.
    #[error("Failed to refresh {operation}: {message}")]
    Refresh {
        operation: &'static str,
        message: String,
        retryable: bool,
    },

    /// The provider answered with an error object.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider answered with a malformed result.
    #[error("Malformed provider response: {0}")]
    Protocol(String),

    /// Operation requires an authorized account.
    #[error("Wallet is not connected")]
    NotConnected,
}

impl WalletError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletError::Timeout { .. } => true,
            WalletError::Provider(e) => !e.is_user_rejected(),
            WalletError::Refresh { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Wrap a failed read as a refresh failure for `operation`.
    pub fn into_refresh(self, operation: &'static str) -> Self {
        let retryable = self.is_retryable();
        WalletError::Refresh {
            operation,
            message: self.to_string(),
            retryable,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::ProviderAbsent => {
                "No wallet detected. Install a browser wallet to continue.".to_string()
            }
            WalletError::UserRejected(_) => {
                "The connection request was rejected in your wallet.".to_string()
            }
            WalletError::Timeout { .. } => {
                "Your wallet did not respond in time. Please try again.".to_string()
            }
            WalletError::NotConnected => "Connect your wallet first.".to_string(),
            other => format!("Wallet error: {}", other),
        }
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Chain the provider is currently pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
}

impl Network {
    pub fn from_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            name: chain_name(chain_id).to_string(),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Human-readable name for well-known chain ids.
pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "homestead",
        5 => "goerli",
        10 => "optimism",
        56 => "bnb",
        137 => "matic",
        8453 => "base",
        42161 => "arbitrum",
        31337 => "anvil",
        11155111 => "sepolia",
        _ => "unknown",
    }
}
