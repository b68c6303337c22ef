//! UTXO pool
//!
//! In-memory map of unspent transaction outputs. Every branch node of the
//! chain forest owns one; `Clone` produces a fully independent copy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, PublicKey};
use crate::validation::{Amount, Transaction, TxInput, TxOutput};

/// Identifies a spendable output: producing transaction + output position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoKey {
    pub tx_hash: Hash,
    pub index: u32,
}

impl UtxoKey {
    pub fn new(tx_hash: Hash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl From<&TxInput> for UtxoKey {
    fn from(input: &TxInput) -> Self {
        Self::new(input.prev_tx_hash, input.output_index)
    }
}

/// Ledger snapshot: the unspent outputs at one point of one branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<UtxoKey, TxOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    /// Snapshot holding only the outputs of `coinbase`
    pub fn from_coinbase(coinbase: &Transaction) -> Self {
        let mut pool = Self::new();
        pool.apply_transaction(coinbase);
        pool
    }

    pub fn contains(&self, key: &UtxoKey) -> bool {
        self.utxos.contains_key(key)
    }

    pub fn get(&self, key: &UtxoKey) -> Option<&TxOutput> {
        self.utxos.get(key)
    }

    /// Insert, overwriting any existing entry
    pub fn add(&mut self, key: UtxoKey, output: TxOutput) {
        self.utxos.insert(key, output);
    }

    pub fn remove(&mut self, key: &UtxoKey) -> Option<TxOutput> {
        self.utxos.remove(key)
    }

    /// Spend the transaction's inputs and record its outputs.
    ///
    /// No validation happens here; callers check the transaction first.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        let tx_hash = tx.hash();

        if !tx.is_coinbase() {
            for input in &tx.inputs {
                self.remove(&UtxoKey::from(input));
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            self.add(UtxoKey::new(tx_hash, index as u32), output.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UtxoKey, &TxOutput)> {
        self.utxos.iter()
    }

    /// All outputs spendable by `owner`, ordered by key
    pub fn outputs_owned_by(&self, owner: &PublicKey) -> Vec<(UtxoKey, &TxOutput)> {
        let mut owned: Vec<_> = self
            .utxos
            .iter()
            .filter(|(_, output)| &output.owner == owner)
            .map(|(key, output)| (*key, output))
            .collect();
        owned.sort_by_key(|(key, _)| *key);
        owned
    }

    pub fn balance_of(&self, owner: &PublicKey) -> Amount {
        self.utxos
            .values()
            .filter(|output| &output.owner == owner)
            .fold(0, |acc: Amount, output| acc.saturating_add(output.value))
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}
