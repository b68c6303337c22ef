//! Block handler
//!
//! Thread-safe entry point over a [`ChainForest`]. Every operation runs
//! under a single lock, so authoring a block (read tip, select, build,
//! append) is atomic with respect to concurrently received blocks and
//! transactions.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ForestConfig;
use crate::consensus::{Block, ChainForest};
use crate::crypto::PublicKey;
use crate::mining::Miner;
use crate::validation::Transaction;

#[derive(Debug)]
pub struct BlockHandler {
    forest: Mutex<ChainForest>,
}

impl BlockHandler {
    pub fn new(forest: ChainForest) -> Self {
        Self {
            forest: Mutex::new(forest),
        }
    }

    pub fn from_genesis(genesis: Block, config: ForestConfig) -> Self {
        Self::new(ChainForest::new(genesis, config))
    }

    /// Author a block on the canonical tip paying the coinbase to `owner`.
    ///
    /// Pending transactions are chosen with the configured selection policy.
    /// Returns the block if the forest accepted it; otherwise nothing changes.
    pub fn create_block(&self, owner: PublicKey) -> Option<Block> {
        let mut forest = self.forest.lock();

        let parent = forest.max_height_block().hash()?;
        let miner = Miner::from_config(owner, forest.config());
        let pending = forest.transaction_pool().transactions();

        let (block, selection) =
            match miner.assemble_block(parent, forest.max_height_ledger(), &pending) {
                Ok(assembled) => assembled,
                Err(err) => {
                    warn!(%err, "block assembly failed");
                    return None;
                }
            };

        match forest.try_add_block(block.clone()) {
            Ok(_) => {
                debug!(
                    txs = selection.accepted.len(),
                    fees = selection.total_fees,
                    "authored block appended"
                );
                Some(block)
            }
            Err(reason) => {
                warn!(%reason, "authored block rejected");
                None
            }
        }
    }

    /// Validate and append a block received from elsewhere
    pub fn process_block(&self, block: Block) -> bool {
        self.forest.lock().add_block(block)
    }

    /// Offer a transaction to the pending pool
    pub fn process_transaction(&self, tx: Transaction) -> bool {
        self.forest.lock().add_transaction(tx)
    }

    /// Run `f` with shared access to the forest while holding the lock
    pub fn with_forest<R>(&self, f: impl FnOnce(&ChainForest) -> R) -> R {
        f(&self.forest.lock())
    }

    pub fn into_forest(self) -> ChainForest {
        self.forest.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::node::create_genesis_block;
    use crate::validation::{TxInput, TxOutput};

    #[test]
    fn test_create_block_includes_pending() {
        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        let genesis = create_genesis_block(bob.public_key(), 10);
        let handler = BlockHandler::from_genesis(genesis.clone(), ForestConfig::default());

        let mut tx = Transaction::new(
            vec![TxInput::new(genesis.coinbase().hash(), 0)],
            vec![TxOutput::new(10, alice.public_key())],
        );
        tx.sign_input(0, &bob).unwrap();
        assert!(handler.process_transaction(tx.clone()));

        let block = handler.create_block(alice.public_key()).unwrap();
        assert_eq!(block.transactions(), &[tx]);
        assert_eq!(block.prev_block_hash(), genesis.hash());

        handler.with_forest(|forest| {
            assert_eq!(forest.max_height(), 2);
            assert_eq!(forest.max_height_block(), &block);
            assert!(forest.transaction_pool().is_empty());
        });
    }

    #[test]
    fn test_rejected_authoring_leaves_no_trace() {
        let bob = PrivateKey::generate();
        let genesis = create_genesis_block(bob.public_key(), 10);
        let config = ForestConfig {
            block_reward: -1,
            ..ForestConfig::default()
        };
        let handler = BlockHandler::from_genesis(genesis, config);

        assert!(handler.create_block(bob.public_key()).is_none());
        handler.with_forest(|forest| {
            assert_eq!(forest.max_height(), 1);
            assert_eq!(forest.node_count(), 1);
        });
    }
}
