//! Forked UTXO ledger core
//!
//! Validates transactions against unspent-output snapshots and keeps a tree
//! of competing branches, each block owning the ledger that results from it.
//! The highest branch is canonical; branches that fall too far behind are
//! pruned.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mining;
pub mod node;
pub mod storage;
pub mod validation;

/// Protocol constants
pub mod constants {
    /// Maximum depth behind the tip at which a branch may still be extended
    pub const CUT_OFF_AGE: u64 = 12;

    /// Coinbase value of authored blocks unless configured otherwise
    pub const DEFAULT_BLOCK_REWARD: i64 = 25;
}
