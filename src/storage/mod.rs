//! Storage module - ledger snapshots and the pending transaction pool

mod pool;
mod utxo;

pub use pool::*;
pub use utxo::*;
