//! Transaction validation against a ledger snapshot
//!
//! Stateless: every call receives the snapshot it validates against. Checks
//! run in a fixed order and stop at the first failure, so the rejection
//! reported for a given transaction and snapshot is always the same.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace};

use crate::storage::{UtxoKey, UtxoPool};
use crate::validation::{Amount, Transaction};

/// Why a transaction was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxRejection {
    #[error("coinbase transactions cannot be spent as regular transactions")]
    UnexpectedCoinbase,
    #[error("input {index} references an output that is not unspent")]
    MissingInput { index: usize },
    #[error("input {index} carries an invalid signature")]
    BadSignature { index: usize },
    #[error("input {index} claims an output already claimed by this transaction")]
    DuplicateInput { index: usize },
    #[error("output {index} has a negative value")]
    NegativeOutput { index: usize },
    #[error("outputs exceed inputs at output {index}")]
    Overspend { index: usize },
    #[error("value arithmetic overflowed")]
    ValueOverflow,
}

/// Validate `tx` against `pool`, returning its fee.
///
/// Each input in turn must:
/// 1. refer to an output present in `pool`
/// 2. be signed by the owner of the output it spends
/// 3. not claim an output already claimed by an earlier input
///
/// Then each output in turn must:
/// 4. carry a non-negative value
/// 5. keep the running output total within the input total
pub fn check_transaction(tx: &Transaction, pool: &UtxoPool) -> Result<Amount, TxRejection> {
    if tx.is_coinbase() {
        return Err(TxRejection::UnexpectedCoinbase);
    }

    let mut claimed = HashSet::with_capacity(tx.inputs.len());
    let mut input_total: Amount = 0;
    for (index, input) in tx.inputs.iter().enumerate() {
        let key = UtxoKey::from(input);
        let output = pool.get(&key).ok_or(TxRejection::MissingInput { index })?;

        let payload = tx
            .signing_payload(index)
            .ok_or(TxRejection::MissingInput { index })?;
        if !output.owner.verify(&payload, &input.signature) {
            return Err(TxRejection::BadSignature { index });
        }

        if !claimed.insert(key) {
            return Err(TxRejection::DuplicateInput { index });
        }

        input_total = input_total
            .checked_add(output.value)
            .ok_or(TxRejection::ValueOverflow)?;
        trace!(index, value = output.value, "input accepted");
    }

    let mut output_total: Amount = 0;
    for (index, output) in tx.outputs.iter().enumerate() {
        if output.value < 0 {
            return Err(TxRejection::NegativeOutput { index });
        }
        output_total = output_total
            .checked_add(output.value)
            .ok_or(TxRejection::ValueOverflow)?;
        if output_total > input_total {
            return Err(TxRejection::Overspend { index });
        }
    }

    Ok(input_total - output_total)
}

/// Boolean form of [`check_transaction`]; rejections are logged at debug
pub fn is_valid(tx: &Transaction, pool: &UtxoPool) -> bool {
    match check_transaction(tx, pool) {
        Ok(_) => true,
        Err(reason) => {
            debug!(tx = %tx.hash().short(), %reason, "transaction rejected");
            false
        }
    }
}

/// Inputs minus outputs.
///
/// Inputs missing from `pool` and negative outputs count as zero, so this is
/// defined for any transaction, valid or not.
pub fn transaction_fee(tx: &Transaction, pool: &UtxoPool) -> Amount {
    let inputs = tx
        .inputs
        .iter()
        .filter_map(|input| pool.get(&UtxoKey::from(input)))
        .map(|output| output.value.max(0))
        .fold(0 as Amount, Amount::saturating_add);
    let outputs = tx
        .outputs
        .iter()
        .map(|output| output.value.max(0))
        .fold(0 as Amount, Amount::saturating_add);
    inputs.saturating_sub(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_bytes, PrivateKey};
    use crate::validation::{TxInput, TxOutput};

    /// Snapshot holding one output of `value` owned by `key`
    fn funded(key: &PrivateKey, value: Amount) -> (UtxoPool, Transaction) {
        let coinbase = Transaction::coinbase(value, key.public_key(), None);
        (UtxoPool::from_coinbase(&coinbase), coinbase)
    }

    fn spend(from: &Transaction, index: u32, values: &[Amount], to: &PrivateKey) -> Transaction {
        Transaction::new(
            vec![TxInput::new(from.hash(), index)],
            values
                .iter()
                .map(|v| TxOutput::new(*v, to.public_key()))
                .collect(),
        )
    }

    #[test]
    fn test_valid_split() {
        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let mut tx = spend(&coinbase, 0, &[5, 3, 2], &alice);
        tx.sign_input(0, &bob).unwrap();

        assert_eq!(check_transaction(&tx, &pool), Ok(0));
        assert!(is_valid(&tx, &pool));
    }

    #[test]
    fn test_missing_input() {
        let bob = PrivateKey::generate();
        let (pool, _) = funded(&bob, 10);

        let mut tx = Transaction::new(
            vec![TxInput::new(hash_bytes(b"nowhere"), 0)],
            vec![TxOutput::new(1, bob.public_key())],
        );
        tx.sign_input(0, &bob).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::MissingInput { index: 0 })
        );
    }

    #[test]
    fn test_wrong_signer() {
        let bob = PrivateKey::generate();
        let mallory = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let mut tx = spend(&coinbase, 0, &[10], &mallory);
        tx.sign_input(0, &mallory).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::BadSignature { index: 0 })
        );
    }

    #[test]
    fn test_unsigned_input() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);
        let tx = spend(&coinbase, 0, &[1], &bob);

        assert!(!is_valid(&tx, &pool));
    }

    #[test]
    fn test_bad_signature_reported_before_later_missing_input() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        // input 0 exists but is unsigned, input 1 does not exist
        let tx = Transaction::new(
            vec![
                TxInput::new(coinbase.hash(), 0),
                TxInput::new(hash_bytes(b"nowhere"), 0),
            ],
            vec![TxOutput::new(1, bob.public_key())],
        );

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::BadSignature { index: 0 })
        );
    }

    #[test]
    fn test_duplicate_reported_before_later_bad_signature() {
        let bob = PrivateKey::generate();
        let (mut pool, coinbase) = funded(&bob, 10);

        let mut halves = spend(&coinbase, 0, &[5, 5], &bob);
        halves.sign_input(0, &bob).unwrap();
        pool.apply_transaction(&halves);

        // input 1 repeats input 0, input 2 exists but is unsigned
        let mut tx = Transaction::new(
            vec![
                TxInput::new(halves.hash(), 0),
                TxInput::new(halves.hash(), 0),
                TxInput::new(halves.hash(), 1),
            ],
            vec![TxOutput::new(1, bob.public_key())],
        );
        tx.sign_input(0, &bob).unwrap();
        tx.sign_input(1, &bob).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::DuplicateInput { index: 1 })
        );
    }

    #[test]
    fn test_duplicate_input() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let mut tx = Transaction::new(
            vec![
                TxInput::new(coinbase.hash(), 0),
                TxInput::new(coinbase.hash(), 0),
            ],
            vec![TxOutput::new(20, bob.public_key())],
        );
        tx.sign_input(0, &bob).unwrap();
        tx.sign_input(1, &bob).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::DuplicateInput { index: 1 })
        );
    }

    #[test]
    fn test_negative_output() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let mut tx = spend(&coinbase, 0, &[3, -2], &bob);
        tx.sign_input(0, &bob).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::NegativeOutput { index: 1 })
        );
    }

    #[test]
    fn test_overspend_reports_first_offending_output() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let mut tx = spend(&coinbase, 0, &[6, 6, 1], &bob);
        tx.sign_input(0, &bob).unwrap();

        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TxRejection::Overspend { index: 1 })
        );
    }

    #[test]
    fn test_coinbase_rejected() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);
        assert_eq!(
            check_transaction(&coinbase, &pool),
            Err(TxRejection::UnexpectedCoinbase)
        );
    }

    #[test]
    fn test_fee_with_unresolvable_parts() {
        let bob = PrivateKey::generate();
        let (pool, coinbase) = funded(&bob, 10);

        let tx = Transaction::new(
            vec![
                TxInput::new(coinbase.hash(), 0),
                TxInput::new(hash_bytes(b"nowhere"), 3),
            ],
            vec![
                TxOutput::new(4, bob.public_key()),
                TxOutput::new(-100, bob.public_key()),
            ],
        );

        assert_eq!(transaction_fee(&tx, &pool), 6);
    }
}
