//! Pending transaction pool
//!
//! Transactions accepted by the canonical tip but not yet included in a
//! block. Keyed by transaction hash; iteration follows arrival order so block
//! authoring is deterministic for a given submission sequence.

use std::collections::HashMap;

use crate::crypto::Hash;
use crate::validation::Transaction;

#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    txs: HashMap<Hash, (u64, Transaction)>,
    next_seq: u64,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx`. Returns false if it was already pooled.
    pub fn add(&mut self, tx: Transaction) -> bool {
        let hash = tx.hash();
        if self.txs.contains_key(&hash) {
            return false;
        }
        self.txs.insert(hash, (self.next_seq, tx));
        self.next_seq += 1;
        true
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Transaction> {
        self.txs.remove(hash).map(|(_, tx)| tx)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.txs.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.txs.get(hash).map(|(_, tx)| tx)
    }

    /// Pooled transactions in arrival order
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut entries: Vec<_> = self.txs.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, tx)| tx.clone()).collect()
    }

    /// Keep only transactions for which `keep` holds. Returns how many
    /// were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Transaction) -> bool) -> usize {
        let before = self.txs.len();
        self.txs.retain(|_, (_, tx)| keep(tx));
        before - self.txs.len()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_bytes, PrivateKey};
    use crate::validation::{TxInput, TxOutput};

    fn tx(tag: &[u8]) -> Transaction {
        Transaction::new(
            vec![TxInput::new(hash_bytes(tag), 0)],
            vec![TxOutput::new(1, PrivateKey::generate().public_key())],
        )
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut pool = TransactionPool::new();
        let t = tx(b"a");

        assert!(pool.add(t.clone()));
        assert!(!pool.add(t.clone()));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&t.hash()));
    }

    #[test]
    fn test_remove() {
        let mut pool = TransactionPool::new();
        let t = tx(b"a");
        pool.add(t.clone());

        assert_eq!(pool.remove(&t.hash()), Some(t.clone()));
        assert!(pool.remove(&t.hash()).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_arrival_order() {
        let mut pool = TransactionPool::new();
        let txs: Vec<_> = [b"c", b"a", b"b"].iter().map(|t| tx(*t)).collect();
        for t in &txs {
            pool.add(t.clone());
        }
        pool.remove(&txs[1].hash());
        pool.add(txs[1].clone());

        let order: Vec<_> = pool.transactions().iter().map(|t| t.hash()).collect();
        assert_eq!(order, vec![txs[0].hash(), txs[2].hash(), txs[1].hash()]);
    }

    #[test]
    fn test_retain_reports_dropped() {
        let mut pool = TransactionPool::new();
        let keep = tx(b"keep");
        let drop = tx(b"drop");
        pool.add(keep.clone());
        pool.add(drop.clone());

        let dropped = pool.retain(|t| t.hash() == keep.hash());
        assert_eq!(dropped, 1);
        assert!(pool.contains(&keep.hash()));
        assert!(!pool.contains(&drop.hash()));
        assert_eq!(pool.retain(|_| true), 0);
    }
}
