//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (difficulty bounds, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::CoreConfig;

/// Highest difficulty accepted; beyond this a single append is effectively unbounded.
pub const MAX_DIFFICULTY: usize = 16;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. "ledger.difficulty").
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.ledger.difficulty == 0 || config.ledger.difficulty > MAX_DIFFICULTY {
        errors.push(ValidationError::new(
            "ledger.difficulty",
            format!("must be between 1 and {}", MAX_DIFFICULTY),
        ));
    }

    if config.wallet.request_timeout_secs == 0 {
        errors.push(ValidationError::new("wallet.request_timeout_secs", "must be > 0"));
    }
    if config.wallet.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("wallet.connect_timeout_secs", "must be > 0"));
    }
    if config.wallet.decimals > 77 {
        // 10^78 no longer fits in a U256
        errors.push(ValidationError::new("wallet.decimals", "must be <= 77"));
    }
    if let Some(vendor) = &config.wallet.preferred_vendor {
        if vendor.trim().is_empty() {
            errors.push(ValidationError::new("wallet.preferred_vendor", "must not be blank"));
        }
    }

    if config.rpc.enabled {
        if config.rpc.rpc_url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new("rpc.rpc_url", "is not a valid URL"));
        }
        for failover in &config.rpc.failover_urls {
            if failover.parse::<url::Url>().is_err() {
                errors.push(ValidationError::new(
                    "rpc.failover_urls",
                    format!("'{}' is not a valid URL", failover),
                ));
            }
        }
        if config.rpc.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new("rpc.rpc_timeout_secs", "must be > 0"));
        }
        if config.rpc.poll_interval_ms == 0 {
            errors.push(ValidationError::new("rpc.poll_interval_ms", "must be > 0"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
