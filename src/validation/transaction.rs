//! Transaction structure
//!
//! UTXO-based transactions whose inputs carry Schnorr signatures over a
//! per-input signing payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{hash_bytes, Hash, PrivateKey, PublicKey, SchnorrSignature, SignatureError};

/// Value in base units. Signed so that malformed negative outputs received
/// from peers are representable and can be rejected.
pub type Amount = i64;

/// Output index marking the single pseudo-input of a coinbase
pub const COINBASE_INDEX: u32 = u32::MAX;

/// Domain tag prefixed to every signing payload
const SIGNING_TAG: &[u8] = b"utxo-forest/tx-input/v1";

/// Errors raised while building or signing a transaction
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("input index {index} out of range ({len} inputs)")]
    InputOutOfRange { index: usize, len: usize },
    #[error("cannot sign a coinbase input")]
    CoinbaseInput,
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A transaction input referencing a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Hash of the transaction containing the output
    pub prev_tx_hash: Hash,
    /// Index of the output in that transaction
    pub output_index: u32,
    /// Signature by the referenced output's owner
    pub signature: SchnorrSignature,
}

impl TxInput {
    /// Unsigned input spending `(prev_tx_hash, output_index)`
    pub fn new(prev_tx_hash: Hash, output_index: u32) -> Self {
        Self {
            prev_tx_hash,
            output_index,
            signature: SchnorrSignature::empty(),
        }
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units
    pub value: Amount,
    /// Key allowed to spend this output
    pub owner: PublicKey,
}

impl TxOutput {
    pub fn new(value: Amount, owner: PublicKey) -> Self {
        Self { value, owner }
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction version
    pub version: u32,
    /// Transaction inputs
    pub inputs: Vec<TxInput>,
    /// Transaction outputs
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
        }
    }

    /// Create a coinbase paying `value` to `owner`.
    ///
    /// The pseudo-input records the parent block hash so that coinbases
    /// built on different parents never share a hash.
    pub fn coinbase(value: Amount, owner: PublicKey, parent: Option<Hash>) -> Self {
        Self {
            version: 1,
            inputs: vec![TxInput::new(parent.unwrap_or_else(Hash::zero), COINBASE_INDEX)],
            outputs: vec![TxOutput::new(value, owner)],
        }
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].output_index == COINBASE_INDEX
    }

    /// Content hash, covering signatures
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }

    /// Canonical bytes signed by the owner of input `index`.
    ///
    /// Covers the input's position, its outpoint and every output, never
    /// any signature. `None` if `index` is out of range.
    pub fn signing_payload(&self, index: usize) -> Option<Vec<u8>> {
        let input = self.inputs.get(index)?;

        let mut bytes = Vec::with_capacity(SIGNING_TAG.len() + 48 + self.outputs.len() * 40);
        bytes.extend_from_slice(SIGNING_TAG);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&(index as u32).to_le_bytes());
        bytes.extend_from_slice(&input.prev_tx_hash.0);
        bytes.extend_from_slice(&input.output_index.to_le_bytes());
        self.write_outputs(&mut bytes);
        Some(bytes)
    }

    /// Sign input `index` with `key`, replacing any previous signature
    pub fn sign_input(&mut self, index: usize, key: &PrivateKey) -> Result<(), TransactionError> {
        if self.is_coinbase() {
            return Err(TransactionError::CoinbaseInput);
        }
        let payload = self
            .signing_payload(index)
            .ok_or(TransactionError::InputOutOfRange {
                index,
                len: self.inputs.len(),
            })?;
        self.inputs[index].signature = key.sign(&payload)?;
        Ok(())
    }

    /// Sum of declared output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0 as Amount, |acc, o| acc.checked_add(o.value))
    }

    /// Full encoding used for the content hash
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&self.version.to_le_bytes());

        bytes.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            bytes.extend_from_slice(&input.prev_tx_hash.0);
            bytes.extend_from_slice(&input.output_index.to_le_bytes());
            bytes.extend_from_slice(&input.signature.0);
        }

        self.write_outputs(&mut bytes);
        bytes
    }

    fn write_outputs(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            bytes.extend_from_slice(&output.value.to_le_bytes());
            bytes.extend_from_slice(&output.owner.0);
        }
    }
}
