//! The ledger service: chain ownership, appends and verification.

use std::borrow::Borrow;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::validation::MAX_DIFFICULTY;
use crate::config::LedgerConfig;
use crate::ledger::block::{canonical_json, encode_payload, now_millis, Block, GENESIS_PREVIOUS_HASH};
use crate::ledger::digest::{HashFunction, Sha256Hash};
use crate::ledger::listeners::{ListenerRegistry, ListenerResult, Subscription};
use crate::ledger::miner::{self, Candidate};
use crate::ledger::types::{ChainIntegrityViolation, LedgerError, LedgerResult, ViolationKind};
use crate::observability::metrics;

/// Immutable view of the chain at one point in time.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    blocks: Arc<Vec<Arc<Block>>>,
}

impl ChainSnapshot {
    /// Last block of the chain.
    pub fn tail(&self) -> &Arc<Block> {
        // A chain always holds at least the genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Owned copies of every block, e.g. for export.
    pub fn to_blocks(&self) -> Vec<Block> {
        self.blocks.iter().map(|b| b.as_ref().clone()).collect()
    }
}

impl Deref for ChainSnapshot {
    type Target = [Arc<Block>];

    fn deref(&self) -> &Self::Target {
        &self.blocks
    }
}

/// Process-local, append-only, proof-of-work sealed event ledger.
///
/// Construct once and share through `Arc<Ledger>`. Appends are serialized;
/// readers take lock-free snapshots.
pub struct Ledger {
    difficulty: usize,
    mining_limit: Duration,
    hasher: Arc<dyn HashFunction>,
    chain: ArcSwap<Vec<Arc<Block>>>,
    writer: Mutex<()>,
    listeners: ListenerRegistry,
    shutdown: CancellationToken,
}

impl Ledger {
    /// Create a ledger holding only a genesis block, hashed with SHA-256.
    ///
    /// Fails when `difficulty` exceeds [`MAX_DIFFICULTY`].
    pub fn new(config: &LedgerConfig) -> LedgerResult<Self> {
        Self::with_hasher(config, Arc::new(Sha256Hash))
    }

    /// Create a ledger with a custom digest function.
    pub fn with_hasher(config: &LedgerConfig, hasher: Arc<dyn HashFunction>) -> LedgerResult<Self> {
        if config.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::DifficultyTooHigh {
                difficulty: config.difficulty,
                max: MAX_DIFFICULTY,
            });
        }

        let genesis = Arc::new(Block::genesis(now_millis(), hasher.as_ref()));
        tracing::info!(
            difficulty = config.difficulty,
            genesis_hash = %genesis.hash,
            "Ledger initialized"
        );

        Ok(Self {
            difficulty: config.difficulty,
            mining_limit: Duration::from_secs(config.mining_timeout_secs),
            hasher,
            chain: ArcSwap::from_pointee(vec![genesis]),
            writer: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Current chain contents. Later appends do not affect the returned view.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            blocks: self.chain.load_full(),
        }
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.chain.load().len()
    }

    /// Always false: a ledger holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The registry notified on every append.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Shorthand for `listeners().subscribe(listener)`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Block>) -> ListenerResult + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Seal `payload` into a new block, append it and notify listeners.
    pub async fn append<P>(&self, payload: &P) -> LedgerResult<Arc<Block>>
    where
        P: Serialize + ?Sized,
    {
        self.append_with_cancel(payload, CancellationToken::new()).await
    }

    /// Like [`Ledger::append`], abandoning the search when `cancel` fires.
    /// A cancelled append leaves the chain unchanged.
    pub async fn append_with_cancel<P>(
        &self,
        payload: &P,
        cancel: CancellationToken,
    ) -> LedgerResult<Arc<Block>>
    where
        P: Serialize + ?Sized,
    {
        if self.shutdown.is_cancelled() {
            return Err(LedgerError::Shutdown);
        }
        let payload = encode_payload(payload)?;
        let payload_json = canonical_json(&payload);

        let _writer = self.writer.lock().await;
        let current = self.chain.load_full();
        let tail = current[current.len() - 1].clone();

        let candidate = Candidate {
            index: tail.index + 1,
            timestamp: now_millis(),
            payload,
            payload_json,
            previous_hash: tail.hash.clone(),
        };

        let worker = self.shutdown.child_token();
        let outcome = tokio::select! {
            outcome = miner::mine(
                candidate,
                self.difficulty,
                self.hasher.clone(),
                worker.clone(),
                self.mining_limit,
            ) => outcome,
            _ = cancel.cancelled() => {
                worker.cancel();
                Err(LedgerError::MiningCancelled)
            }
        };
        let outcome = match outcome {
            Err(LedgerError::MiningCancelled) if self.shutdown.is_cancelled() => {
                return Err(LedgerError::Shutdown)
            }
            other => other?,
        };

        let block = Arc::new(outcome.block);
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(block.clone());
        let chain_len = next.len();
        self.chain.store(Arc::new(next));

        metrics::record_block_appended(chain_len, outcome.elapsed, outcome.hashes);
        tracing::info!(
            index = block.index,
            nonce = block.nonce,
            hash = %block.hash,
            record_type = block.record_type().unwrap_or("-"),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Block appended"
        );

        self.listeners.notify(&block);
        Ok(block)
    }

    /// Recompute every hash and check every link.
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    /// Like [`Ledger::is_valid`], reporting the first broken block.
    pub fn verify(&self) -> Result<(), ChainIntegrityViolation> {
        let chain = self.chain.load();
        let result = verify_blocks(chain.as_slice(), self.hasher.as_ref());
        if let Err(violation) = &result {
            tracing::warn!(index = violation.index, kind = %violation.kind, "Chain verification failed");
        }
        result
    }

    /// Replace the chain with a fresh genesis block. Listeners are kept.
    pub async fn reset(&self) {
        let _writer = self.writer.lock().await;
        let genesis = Arc::new(Block::genesis(now_millis(), self.hasher.as_ref()));
        self.chain.store(Arc::new(vec![genesis]));
        metrics::record_chain_length(1);
        tracing::info!("Ledger reset to genesis");
    }

    /// Cancel in-flight mining; later appends fail with [`LedgerError::Shutdown`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        tracing::info!(blocks = self.len(), "Ledger shut down");
    }

    #[cfg(test)]
    pub(crate) fn tamper<F: FnOnce(&mut Block)>(&self, index: usize, mutate: F) {
        let mut blocks: Vec<Arc<Block>> = self.chain.load_full().iter().cloned().collect();
        let mut block = blocks[index].as_ref().clone();
        mutate(&mut block);
        blocks[index] = Arc::new(block);
        self.chain.store(Arc::new(blocks));
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("difficulty", &self.difficulty)
            .field("blocks", &self.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Verify a block sequence, e.g. one imported from an export.
///
/// Checks that the first block is a genesis block, that every block's
/// stored hash matches its contents, and that every block links to its
/// predecessor by hash and index.
pub fn verify_blocks<B: Borrow<Block>>(
    blocks: &[B],
    hasher: &dyn HashFunction,
) -> Result<(), ChainIntegrityViolation> {
    let violation = |index, kind| ChainIntegrityViolation { index, kind };

    let genesis: &Block = match blocks.first() {
        Some(block) => block.borrow(),
        None => return Err(violation(0, ViolationKind::BadGenesis)),
    };
    if genesis.index != 0 || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
        return Err(violation(0, ViolationKind::BadGenesis));
    }
    if genesis.compute_hash(hasher) != genesis.hash {
        return Err(violation(0, ViolationKind::HashMismatch));
    }

    for (i, pair) in blocks.windows(2).enumerate() {
        let previous: &Block = pair[0].borrow();
        let current: &Block = pair[1].borrow();
        let index = i + 1;

        if current.compute_hash(hasher) != current.hash {
            return Err(violation(index, ViolationKind::HashMismatch));
        }
        if current.previous_hash != previous.hash {
            return Err(violation(index, ViolationKind::PreviousHashMismatch));
        }
        if current.index != previous.index + 1 {
            return Err(violation(index, ViolationKind::IndexMismatch));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger(difficulty: usize) -> Ledger {
        Ledger::new(&LedgerConfig {
            difficulty,
            mining_timeout_secs: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_unreachable_difficulty_rejected() {
        let result = Ledger::new(&LedgerConfig {
            difficulty: 65,
            mining_timeout_secs: 0,
        });
        assert!(matches!(
            result,
            Err(LedgerError::DifficultyTooHigh { difficulty: 65, max: MAX_DIFFICULTY })
        ));
        assert!(Ledger::new(&LedgerConfig {
            difficulty: MAX_DIFFICULTY,
            mining_timeout_secs: 0,
        })
        .is_ok());
    }

    #[tokio::test]
    async fn test_append_links_to_tail() {
        let ledger = ledger(2);
        let before = ledger.snapshot();

        let block = ledger.append("hello").await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, before.tail().hash);
        assert!(block.hash.starts_with("00"));
        assert_eq!(ledger.len(), 2);
        assert_eq!(before.len(), 1);
    }

    #[tokio::test]
    async fn test_tamper_each_field_detected() {
        let ledger = ledger(1);
        for i in 0..3 {
            ledger.append(&json!({"type": "user_login", "n": i})).await.unwrap();
        }
        assert!(ledger.is_valid());

        ledger.tamper(1, |b| b.payload = json!({"type": "forged"}));
        assert_eq!(
            ledger.verify(),
            Err(ChainIntegrityViolation { index: 1, kind: ViolationKind::HashMismatch })
        );
    }

    #[tokio::test]
    async fn test_rehashed_forgery_breaks_next_link() {
        let ledger = ledger(1);
        ledger.append("a").await.unwrap();
        ledger.append("b").await.unwrap();

        let hasher = Sha256Hash;
        ledger.tamper(1, |b| {
            b.payload = json!("forged");
            b.hash = b.compute_hash(&hasher);
        });
        let violation = ledger.verify().unwrap_err();
        assert_eq!(violation.index, 2);
        assert_eq!(violation.kind, ViolationKind::PreviousHashMismatch);
    }

    #[tokio::test]
    async fn test_genesis_tamper_detected() {
        let ledger = ledger(1);
        ledger.append("a").await.unwrap();
        ledger.tamper(0, |b| b.timestamp += 1);
        assert!(!ledger.is_valid());
    }

    #[tokio::test]
    async fn test_reset_keeps_listeners() {
        let ledger = ledger(1);
        let _sub = ledger.subscribe(|_| Ok(()));
        ledger.append("a").await.unwrap();

        ledger.reset().await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.listeners().len(), 1);
        assert!(ledger.is_valid());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_appends() {
        let ledger = ledger(1);
        ledger.shutdown();
        assert_eq!(ledger.append("late").await.unwrap_err(), LedgerError::Shutdown);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_append_leaves_chain_unchanged() {
        // Difficulty 16 is never met in practice.
        let ledger = ledger(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ledger.append_with_cancel("never", cancel).await;
        assert_eq!(result.unwrap_err(), LedgerError::MiningCancelled);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_verify_empty_sequence() {
        let blocks: Vec<Block> = Vec::new();
        let violation = verify_blocks(&blocks, &Sha256Hash).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::BadGenesis);
    }
}
