//! Chain forest
//!
//! Tree of blocks rooted at genesis. Every node owns the ledger snapshot
//! that results from applying its block on top of its parent's snapshot, so
//! competing branches never share mutable state. The highest node is the
//! canonical tip; the first node to reach a height keeps the tip on ties.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Once the
//! tip is `cut_off_age` blocks ahead, lower nodes can no longer be extended:
//! dead branches are removed and surviving ancestors drop their snapshot.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ForestConfig;
use crate::consensus::Block;
use crate::crypto::Hash;
use crate::storage::{TransactionPool, UtxoPool};
use crate::validation::{check_transaction, Transaction, TxRejection};

/// Arena slot of a node. Valid until that node is pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Why a block was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("block is not finalized")]
    Unfinalized,
    #[error("block hash does not match its contents")]
    HashMismatch,
    #[error("block {0} is already in the forest")]
    Duplicate(Hash),
    #[error("block has no parent")]
    MissingParent,
    #[error("parent {0} is not retained")]
    UnknownParent(Hash),
    #[error("height {height} is too far behind tip height {tip_height}")]
    StaleBranch { height: u64, tip_height: u64 },
    #[error("coinbase is malformed")]
    BadCoinbase,
    #[error("transaction {index} is invalid: {reason}")]
    InvalidTransaction { index: usize, reason: TxRejection },
}

/// A block together with the ledger state after it
#[derive(Debug)]
pub struct ChainNode {
    block: Block,
    hash: Hash,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    height: u64,
    ledger: UtxoPool,
    archived: bool,
}

impl ChainNode {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Genesis is height 1
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Ledger after this block; `None` once the node is archived
    pub fn ledger(&self) -> Option<&UtxoPool> {
        (!self.archived).then_some(&self.ledger)
    }

    /// Kept only as an ancestor of extendable nodes
    pub fn is_archived(&self) -> bool {
        self.archived
    }
}

/// Summary of the forest's current shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestStats {
    pub height: u64,
    pub tip_hash: Hash,
    pub nodes: usize,
    pub archived: usize,
    pub leaves: usize,
    pub pending: usize,
}

/// Outcome of one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: usize,
    pub archived: usize,
}

#[derive(Debug)]
pub struct ChainForest {
    nodes: Vec<Option<ChainNode>>,
    free: Vec<usize>,
    index: HashMap<Hash, NodeId>,
    root: NodeId,
    tip: NodeId,
    pool: TransactionPool,
    config: ForestConfig,
    /// Tip height at the last pruning pass
    pruned_at: u64,
}

impl ChainForest {
    /// Start a forest from a genesis block, which is trusted as-is.
    ///
    /// An unsealed genesis is finalized here.
    pub fn new(mut genesis: Block, config: ForestConfig) -> Self {
        let hash = genesis.finalize();

        let mut ledger = UtxoPool::from_coinbase(genesis.coinbase());
        for tx in genesis.transactions() {
            ledger.apply_transaction(tx);
        }

        let root = NodeId(0);
        let node = ChainNode {
            block: genesis,
            hash,
            parent: None,
            children: Vec::new(),
            height: 1,
            ledger,
            archived: false,
        };

        info!(genesis = %hash.short(), cut_off_age = config.cut_off_age, "chain forest created");

        Self {
            nodes: vec![Some(node)],
            free: Vec::new(),
            index: HashMap::from([(hash, root)]),
            root,
            tip: root,
            pool: TransactionPool::new(),
            config,
            pruned_at: 1,
        }
    }

    pub fn with_defaults(genesis: Block) -> Self {
        Self::new(genesis, ForestConfig::default())
    }

    /// Add `block` if valid. See [`ChainForest::try_add_block`].
    pub fn add_block(&mut self, block: Block) -> bool {
        match self.try_add_block(block) {
            Ok(_) => true,
            Err(reason) => {
                debug!(%reason, "block rejected");
                false
            }
        }
    }

    /// Validate `block` against its parent's ledger and link it in.
    ///
    /// Nothing is modified unless the whole block is valid. On success the
    /// block's transactions leave the pending pool, the tip moves if the new
    /// node is strictly higher, and the forest is pruned. When the tip moves,
    /// pending transactions that are no longer valid on it are evicted.
    pub fn try_add_block(&mut self, block: Block) -> Result<NodeId, BlockRejection> {
        let hash = block.hash().ok_or(BlockRejection::Unfinalized)?;
        if !block.is_intact() {
            return Err(BlockRejection::HashMismatch);
        }
        if self.index.contains_key(&hash) {
            return Err(BlockRejection::Duplicate(hash));
        }

        let prev = block.prev_block_hash().ok_or(BlockRejection::MissingParent)?;
        let parent_id = *self
            .index
            .get(&prev)
            .ok_or(BlockRejection::UnknownParent(prev))?;
        let parent = self.live(parent_id);

        let height = parent.height + 1;
        let tip_height = self.max_height();
        if height.saturating_add(self.config.cut_off_age) <= tip_height || parent.archived {
            return Err(BlockRejection::StaleBranch { height, tip_height });
        }

        check_coinbase(&block, prev)?;

        let mut ledger = parent.ledger.clone();
        for (index, tx) in block.transactions().iter().enumerate() {
            check_transaction(tx, &ledger)
                .map_err(|reason| BlockRejection::InvalidTransaction { index, reason })?;
            ledger.apply_transaction(tx);
        }
        ledger.apply_transaction(block.coinbase());

        for tx in block.transactions() {
            self.pool.remove(&tx.hash());
        }

        let tx_count = block.transactions().len();
        let id = self.insert(ChainNode {
            block,
            hash,
            parent: Some(parent_id),
            children: Vec::new(),
            height,
            ledger,
            archived: false,
        });
        self.live_mut(parent_id).children.push(id);
        self.index.insert(hash, id);

        let new_tip = height > tip_height;
        if new_tip {
            self.tip = id;
            // pending entries must stay spendable on the canonical tip
            if let Some(Some(node)) = self.nodes.get(id.0) {
                let evicted = self
                    .pool
                    .retain(|tx| check_transaction(tx, &node.ledger).is_ok());
                if evicted > 0 {
                    debug!(evicted, "pending transactions evicted after tip change");
                }
            }
        }
        info!(block = %hash.short(), height, txs = tx_count, new_tip, "block accepted");

        if self.max_height() > self.pruned_at {
            let report = self.prune();
            if report != PruneReport::default() {
                debug!(removed = report.removed, archived = report.archived, "forest pruned");
            }
        }

        Ok(id)
    }

    /// Pool `tx` if it is valid on the canonical tip. Invalid transactions
    /// are dropped. Returns whether the pool gained the transaction.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        match check_transaction(&tx, &self.live(self.tip).ledger) {
            Ok(_) => self.pool.add(tx),
            Err(reason) => {
                debug!(tx = %tx.hash().short(), %reason, "transaction dropped");
                false
            }
        }
    }

    pub fn max_height_block(&self) -> &Block {
        &self.live(self.tip).block
    }

    /// Ledger to author the next block against
    pub fn max_height_ledger(&self) -> &UtxoPool {
        &self.live(self.tip).ledger
    }

    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn max_height(&self) -> u64 {
        self.live(self.tip).height
    }

    pub fn tip(&self) -> NodeId {
        self.tip
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&ChainNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_by_hash(&self, hash: &Hash) -> Option<&ChainNode> {
        self.index.get(hash).and_then(|id| self.node(*id))
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.node_by_hash(hash).map(ChainNode::height)
    }

    /// Ledger after block `hash`, if retained and not archived
    pub fn ledger_at(&self, hash: &Hash) -> Option<&UtxoPool> {
        self.node_by_hash(hash).and_then(ChainNode::ledger)
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn stats(&self) -> ForestStats {
        let live = self.nodes.iter().flatten();
        ForestStats {
            height: self.max_height(),
            tip_hash: self.live(self.tip).hash,
            nodes: self.node_count(),
            archived: live.clone().filter(|n| n.archived).count(),
            leaves: live.filter(|n| n.children.is_empty()).count(),
            pending: self.pool.len(),
        }
    }

    /// Remove nodes that can no longer be extended and have no extendable
    /// descendant; archive the ones that do.
    fn prune(&mut self) -> PruneReport {
        let tip_height = self.max_height();
        self.pruned_at = tip_height;

        // nodes at or above the floor can still take children
        let Some(floor) = tip_height.checked_sub(self.config.cut_off_age) else {
            return PruneReport::default();
        };

        let mut keep = vec![false; self.nodes.len()];
        for (slot, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            if node.height < floor {
                continue;
            }
            let mut cursor = Some(NodeId(slot));
            while let Some(id) = cursor {
                if keep[id.0] {
                    break;
                }
                keep[id.0] = true;
                cursor = self.live(id).parent;
            }
        }

        let mut report = PruneReport::default();
        let mut doomed = Vec::new();
        for (slot, node) in self.nodes.iter_mut().enumerate() {
            let Some(node) = node else { continue };
            if !keep[slot] {
                doomed.push(NodeId(slot));
            } else if node.height < floor && !node.archived {
                node.ledger = UtxoPool::new();
                node.archived = true;
                report.archived += 1;
            }
        }

        for id in doomed {
            let Some(node) = self.nodes[id.0].take() else {
                continue;
            };
            self.index.remove(&node.hash);
            self.free.push(id.0);
            report.removed += 1;

            if let Some(parent) = node.parent {
                if let Some(Some(parent)) = self.nodes.get_mut(parent.0) {
                    parent.children.retain(|child| *child != id);
                }
            }
        }

        report
    }

    fn insert(&mut self, node: ChainNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn live(&self, id: NodeId) -> &ChainNode {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("node {:?} is not retained", id),
        }
    }

    fn live_mut(&mut self, id: NodeId) -> &mut ChainNode {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("node {:?} is not retained", id),
        }
    }
}

/// The coinbase must be a coinbase bound to the block's parent and must not
/// create negative value.
fn check_coinbase(block: &Block, prev: Hash) -> Result<(), BlockRejection> {
    let coinbase = block.coinbase();
    if !coinbase.is_coinbase()
        || coinbase.inputs[0].prev_tx_hash != prev
        || coinbase.outputs.iter().any(|o| o.value < 0)
    {
        return Err(BlockRejection::BadCoinbase);
    }
    Ok(())
}
