//! Cryptography module - BLAKE3 hashing and Schnorr signatures

mod hash;
mod schnorr;

pub use hash::*;
pub use schnorr::*;
