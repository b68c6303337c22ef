//! Validation module - transaction structure and stateless validation

mod transaction;
mod validator;

pub use transaction::*;
pub use validator::*;
