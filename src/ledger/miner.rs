//! Proof-of-work search.
//!
//! The search is CPU-bound and never yields, so it runs on Tokio's blocking
//! pool. The worker polls its cancellation token every
//! [`CANCEL_CHECK_INTERVAL`] nonces.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::ledger::block::{hash_prefix, Block};
use crate::ledger::digest::{meets_difficulty, HashFunction};
use crate::ledger::types::{LedgerError, LedgerResult};
use crate::resilience::bounded;

/// Nonces tried between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// An unsealed block linked to the current tail.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub index: u64,
    pub timestamp: u64,
    pub payload: Value,
    /// Canonical JSON of `payload`, computed once.
    pub payload_json: String,
    pub previous_hash: String,
}

/// A sealed block plus search statistics.
#[derive(Debug, Clone)]
pub struct MiningOutcome {
    pub block: Block,
    pub hashes: u64,
    pub elapsed: Duration,
}

/// Search nonces 0, 1, 2, ... until the hash meets `difficulty`.
pub fn mine_blocking(
    candidate: Candidate,
    difficulty: usize,
    hasher: &dyn HashFunction,
    token: &CancellationToken,
) -> LedgerResult<MiningOutcome> {
    let started = Instant::now();
    let prefix = hash_prefix(
        candidate.index,
        candidate.timestamp,
        &candidate.payload_json,
        &candidate.previous_hash,
    );
    let mut input = String::with_capacity(prefix.len() + 20);
    let mut nonce: u64 = 0;
    let mut hashes: u64 = 0;

    loop {
        input.clear();
        input.push_str(&prefix);
        let _ = write!(input, "{}", nonce);

        let hash = hasher.digest(&input);
        hashes += 1;

        if meets_difficulty(&hash, difficulty) {
            let block = Block {
                index: candidate.index,
                timestamp: candidate.timestamp,
                payload: candidate.payload,
                previous_hash: candidate.previous_hash,
                nonce,
                hash,
            };
            return Ok(MiningOutcome {
                block,
                hashes,
                elapsed: started.elapsed(),
            });
        }

        nonce = nonce.checked_add(1).ok_or(LedgerError::NonceExhausted)?;
        if nonce % CANCEL_CHECK_INTERVAL == 0 && token.is_cancelled() {
            tracing::debug!(index = candidate.index, hashes, "Mining cancelled");
            return Err(LedgerError::MiningCancelled);
        }
    }
}

/// Run [`mine_blocking`] on the blocking pool.
///
/// `limit` bounds the search (zero = unbounded). Dropping the returned
/// future cancels the worker.
pub async fn mine(
    candidate: Candidate,
    difficulty: usize,
    hasher: Arc<dyn HashFunction>,
    token: CancellationToken,
    limit: Duration,
) -> LedgerResult<MiningOutcome> {
    let guard = token.clone().drop_guard();
    let worker_token = token.clone();
    let handle = task::spawn_blocking(move || {
        mine_blocking(candidate, difficulty, hasher.as_ref(), &worker_token)
    });

    let result = match bounded("mining", limit, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(LedgerError::Worker(join_err.to_string())),
        Err(elapsed) => {
            token.cancel();
            tracing::warn!(limit_ms = elapsed.limit.as_millis() as u64, "Mining exceeded time budget");
            Err(LedgerError::MiningTimeout(elapsed.limit))
        }
    };
    let _ = guard.disarm();
    result
}
