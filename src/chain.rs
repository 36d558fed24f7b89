//! The hash-linked chain: append, linkage validation, initialization.

use thiserror::Error;
use tracing::{info, warn};

use crate::model::{Block, CheckoutEvent};
use crate::storage::ChainStore;

/// Why a candidate block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    #[error("block {position}: previous_hash does not match the chain head")]
    PrevHashMismatch { position: u64 },
    #[error("block position gap: expected {expected}, got {actual}")]
    PositionGap { expected: u64, actual: u64 },
    #[error("block {position}: stored hash does not match its recomputed hash")]
    HashMismatch { position: u64 },
}

/// The ordered, hash-linked sequence of all blocks.
///
/// Never empty: constructed with at least a genesis block, mutated only by
/// [`Chain::append`], truncated only by whole-chain replacement at load time.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// A fresh chain holding exactly one genesis block.
    pub fn genesis() -> Chain {
        Chain {
            blocks: vec![Block::genesis()],
        }
    }

    /// Adopt a previously persisted block sequence. Returns `None` for an
    /// empty sequence, which is never a valid chain.
    pub fn from_blocks(blocks: Vec<Block>) -> Option<Chain> {
        if blocks.is_empty() {
            return None;
        }
        Some(Chain { blocks })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn last(&self) -> &Block {
        self.blocks.last().expect("chain is never empty")
    }

    /// Construct, validate, and attach the successor block for `payload`.
    ///
    /// On rejection the chain is unchanged. Persistence is the caller's
    /// responsibility; a failed save never rolls back an accepted append.
    pub fn append(&mut self, payload: CheckoutEvent) -> Result<&Block, AppendError> {
        let candidate = Block::next(self.last(), payload);
        Self::check_successor(&candidate, self.last())?;
        self.blocks.push(candidate);
        Ok(self.last())
    }

    /// Three-part linkage check; all conditions are independently necessary.
    pub fn check_successor(candidate: &Block, prev: &Block) -> Result<(), AppendError> {
        if prev.hash != candidate.previous_hash {
            return Err(AppendError::PrevHashMismatch {
                position: candidate.position,
            });
        }
        if candidate.position != prev.position + 1 {
            return Err(AppendError::PositionGap {
                expected: prev.position + 1,
                actual: candidate.position,
            });
        }
        if candidate.recompute_hash() != candidate.hash {
            return Err(AppendError::HashMismatch {
                position: candidate.position,
            });
        }
        Ok(())
    }

    pub fn is_valid_successor(candidate: &Block, prev: &Block) -> bool {
        Self::check_successor(candidate, prev).is_ok()
    }

    /// Full-chain pass: genesis shape, every adjacent linkage, every hash.
    pub fn validate(&self) -> Result<(), AppendError> {
        let genesis = &self.blocks[0];
        if genesis.position != 0 {
            return Err(AppendError::PositionGap {
                expected: 0,
                actual: genesis.position,
            });
        }
        if !genesis.previous_hash.is_empty() {
            return Err(AppendError::PrevHashMismatch { position: 0 });
        }
        if genesis.recompute_hash() != genesis.hash {
            return Err(AppendError::HashMismatch { position: genesis.position });
        }
        for pair in self.blocks.windows(2) {
            Self::check_successor(&pair[1], &pair[0])?;
        }
        Ok(())
    }
}

/// Startup hook: reload the persisted chain if present and intact, otherwise
/// synthesize a fresh genesis chain and persist it immediately.
pub fn new_chain(store: &ChainStore) -> Chain {
    if let Some(blocks) = store.load() {
        if let Some(chain) = Chain::from_blocks(blocks) {
            match chain.validate() {
                Ok(()) => {
                    info!(blocks = chain.len(), "loaded persisted chain");
                    return chain;
                }
                Err(e) => warn!(error = %e, "persisted chain failed validation, starting fresh"),
            }
        }
    }
    let chain = Chain::genesis();
    if let Err(e) = store.save(chain.blocks()) {
        warn!(error = %e, "could not persist fresh genesis chain");
    }
    chain
}
