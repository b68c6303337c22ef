//! Mining module - transaction selection and block assembly

mod miner;
mod selector;

pub use miner::*;
pub use selector::*;
