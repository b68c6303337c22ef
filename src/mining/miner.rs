//! Block assembly
//!
//! Builds a sealed candidate block on top of a given parent from the
//! transactions the selector accepts.

use crate::config::ForestConfig;
use crate::consensus::{Block, BlockError};
use crate::crypto::{Hash, PublicKey};
use crate::mining::{select_transactions, Selection, SelectionPolicy};
use crate::storage::UtxoPool;
use crate::validation::{Amount, Transaction};

/// Block author
#[derive(Debug, Clone)]
pub struct Miner {
    /// Receives the coinbase
    owner: PublicKey,
    policy: SelectionPolicy,
    reward: Amount,
}

impl Miner {
    pub fn new(owner: PublicKey, policy: SelectionPolicy, reward: Amount) -> Self {
        Self {
            owner,
            policy,
            reward,
        }
    }

    pub fn from_config(owner: PublicKey, config: &ForestConfig) -> Self {
        Self::new(owner, config.selection_policy, config.block_reward)
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Assemble and finalize a block extending `parent_hash`.
    ///
    /// `ledger` is the parent's snapshot; it is only read. The returned
    /// selection carries the ledger the block would produce, before the
    /// coinbase is applied.
    pub fn assemble_block(
        &self,
        parent_hash: Hash,
        ledger: &UtxoPool,
        pending: &[Transaction],
    ) -> Result<(Block, Selection), BlockError> {
        let selection = select_transactions(pending, ledger, self.policy);

        let mut block = Block::new(Some(parent_hash), self.owner.clone(), self.reward);
        for tx in &selection.accepted {
            block.push_transaction(tx.clone())?;
        }
        block.finalize();

        Ok((block, selection))
    }
}
