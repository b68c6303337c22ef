//! Block structure
//!
//! A block is built incrementally and then sealed with [`Block::finalize`],
//! which fixes its hash. Sealed blocks accept no further transactions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{hash_parts, Hash, PublicKey};
use crate::validation::{Amount, Transaction};

const BLOCK_TAG: &[u8] = b"utxo-forest/block/v1";

/// Errors raised while assembling a block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block is finalized; no further transactions may be added")]
    AlreadyFinalized,
}

/// A block: parent link, coinbase and ordered transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the parent block, `None` only for genesis
    prev_block_hash: Option<Hash>,
    /// Value-creating transaction paying the block author
    coinbase: Transaction,
    /// Regular transactions, applied in order
    transactions: Vec<Transaction>,
    /// Set by `finalize`
    hash: Option<Hash>,
}

impl Block {
    /// Start a block on top of `prev_block_hash` paying `reward` to `owner`
    pub fn new(prev_block_hash: Option<Hash>, owner: PublicKey, reward: Amount) -> Self {
        let coinbase = Transaction::coinbase(reward, owner, prev_block_hash);
        Self::with_coinbase(prev_block_hash, coinbase)
    }

    /// Start a block with an explicit coinbase transaction
    pub fn with_coinbase(prev_block_hash: Option<Hash>, coinbase: Transaction) -> Self {
        Self {
            prev_block_hash,
            coinbase,
            transactions: Vec::new(),
            hash: None,
        }
    }

    /// Append a transaction to an unsealed block
    pub fn push_transaction(&mut self, tx: Transaction) -> Result<(), BlockError> {
        if self.hash.is_some() {
            return Err(BlockError::AlreadyFinalized);
        }
        self.transactions.push(tx);
        Ok(())
    }

    /// Seal the block and return its hash. Sealing twice is a no-op.
    pub fn finalize(&mut self) -> Hash {
        match self.hash {
            Some(hash) => hash,
            None => {
                let hash = self.computed_hash();
                self.hash = Some(hash);
                hash
            }
        }
    }

    /// Hash over the block's current contents
    pub fn computed_hash(&self) -> Hash {
        let parent = self.prev_block_hash.unwrap_or_else(Hash::zero);
        let has_parent = [self.prev_block_hash.is_some() as u8];
        let count = (self.transactions.len() as u32).to_le_bytes();
        let coinbase_hash = self.coinbase.hash();
        let tx_hashes: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();

        let mut parts: Vec<&[u8]> = vec![
            BLOCK_TAG,
            has_parent.as_slice(),
            parent.0.as_slice(),
            coinbase_hash.0.as_slice(),
            count.as_slice(),
        ];
        parts.extend(tx_hashes.iter().map(|h| h.0.as_slice()));
        hash_parts(parts)
    }

    /// Sealed hash, `None` until finalized
    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }

    pub fn is_finalized(&self) -> bool {
        self.hash.is_some()
    }

    /// True when the sealed hash still matches the contents
    pub fn is_intact(&self) -> bool {
        self.hash == Some(self.computed_hash())
    }

    pub fn prev_block_hash(&self) -> Option<Hash> {
        self.prev_block_hash
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_none()
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}
