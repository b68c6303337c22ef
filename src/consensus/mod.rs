//! Consensus module - block structure and the chain forest

mod block;
mod forest;

pub use block::*;
pub use forest::*;
