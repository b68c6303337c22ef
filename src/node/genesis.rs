//! Genesis block construction
//!
//! The genesis block has no parent and no regular transactions; its coinbase
//! seeds the initial ledger.

use crate::consensus::Block;
use crate::crypto::PublicKey;
use crate::validation::Amount;

/// Create a finalized genesis block paying `value` to `owner`.
///
/// Deterministic: the same owner and value always yield the same hash.
pub fn create_genesis_block(owner: PublicKey, value: Amount) -> Block {
    let mut genesis = Block::new(None, owner, value);
    genesis.finalize();
    genesis
}
