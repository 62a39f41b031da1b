//! Ledger error definitions.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while appending to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Payload could not be canonically encoded for hashing.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Proof-of-work search was cancelled by the caller.
    #[error("Mining cancelled")]
    MiningCancelled,

    /// Proof-of-work search exceeded the configured budget.
    #[error("Mining timed out after {0:?}")]
    MiningTimeout(Duration),

    /// No SHA-256 hex digest can meet the requested difficulty in practice.
    #[error("Difficulty {difficulty} exceeds the maximum of {max}")]
    DifficultyTooHigh { difficulty: usize, max: usize },

    /// Every nonce was tried without meeting the difficulty target.
    #[error("Nonce space exhausted without meeting difficulty")]
    NonceExhausted,

    /// The ledger has been shut down.
    #[error("Ledger is shut down")]
    Shutdown,

    /// The mining worker panicked or was aborted.
    #[error("Mining worker failed: {0}")]
    Worker(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// What was wrong with the first broken block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Stored hash differs from the hash recomputed from the block's fields.
    HashMismatch,
    /// `previous_hash` does not equal the preceding block's stored hash.
    PreviousHashMismatch,
    /// `index` is not the preceding index plus one.
    IndexMismatch,
    /// First block is not a well-formed genesis block.
    BadGenesis,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ViolationKind::HashMismatch => "stored hash does not match contents",
            ViolationKind::PreviousHashMismatch => "previous hash does not match predecessor",
            ViolationKind::IndexMismatch => "index is not contiguous",
            ViolationKind::BadGenesis => "malformed genesis block",
        };
        f.write_str(text)
    }
}

/// First location at which a chain fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Chain integrity violation at block {index}: {kind}")]
pub struct ChainIntegrityViolation {
    /// Expected index (position in the chain) of the offending block.
    pub index: usize,
    pub kind: ViolationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LedgerError::MiningTimeout(Duration::from_millis(250)).to_string(),
            "Mining timed out after 250ms"
        );

        let violation = ChainIntegrityViolation {
            index: 3,
            kind: ViolationKind::PreviousHashMismatch,
        };
        assert_eq!(
            violation.to_string(),
            "Chain integrity violation at block 3: previous hash does not match predecessor"
        );
    }
}
