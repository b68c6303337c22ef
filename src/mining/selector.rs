//! Transaction selection for block authoring
//!
//! Picks a mutually consistent subset of candidate transactions by validating
//! them one at a time against a working copy of a ledger snapshot, applying
//! each accepted transaction before looking at the next.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::UtxoPool;
use crate::validation::{check_transaction, Amount, Transaction};

/// How candidates are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Accept candidates in the order given whenever they are valid
    #[default]
    FirstValid,
    /// Repeatedly accept the valid candidate with the highest fee.
    ///
    /// Greedy: conflicts go to the higher fee, and a transaction spending
    /// another candidate's output becomes eligible once that parent is in.
    /// This does not search for the fee-optimal subset.
    MaxFee,
}

/// Result of a selection pass
#[derive(Debug, Clone)]
pub struct Selection {
    /// Accepted transactions, in an order that validates sequentially
    pub accepted: Vec<Transaction>,
    /// Working snapshot with every accepted transaction applied
    pub ledger: UtxoPool,
    /// Sum of fees of the accepted transactions
    pub total_fees: Amount,
}

/// Select from `candidates` against a copy of `snapshot`.
///
/// `snapshot` itself is never modified; the caller decides whether to commit
/// the returned ledger.
pub fn select_transactions(
    candidates: &[Transaction],
    snapshot: &UtxoPool,
    policy: SelectionPolicy,
) -> Selection {
    let mut selection = Selection {
        accepted: Vec::new(),
        ledger: snapshot.clone(),
        total_fees: 0,
    };

    match policy {
        SelectionPolicy::FirstValid => select_first_valid(candidates, &mut selection),
        SelectionPolicy::MaxFee => select_max_fee(candidates, &mut selection),
    }

    debug!(
        ?policy,
        candidates = candidates.len(),
        accepted = selection.accepted.len(),
        total_fees = selection.total_fees,
        "transaction selection done"
    );
    selection
}

fn select_first_valid(candidates: &[Transaction], selection: &mut Selection) {
    for tx in candidates {
        match check_transaction(tx, &selection.ledger) {
            Ok(fee) => selection.accept(tx, fee),
            Err(reason) => debug!(tx = %tx.hash().short(), %reason, "candidate skipped"),
        }
    }
}

fn select_max_fee(candidates: &[Transaction], selection: &mut Selection) {
    let mut remaining: Vec<&Transaction> = candidates.iter().collect();

    loop {
        let mut best: Option<(usize, Amount)> = None;
        for (pos, tx) in remaining.iter().enumerate() {
            if let Ok(fee) = check_transaction(tx, &selection.ledger) {
                // strict comparison keeps the earliest candidate on ties
                if best.map_or(true, |(_, best_fee)| fee > best_fee) {
                    best = Some((pos, fee));
                }
            }
        }

        let Some((pos, fee)) = best else {
            break;
        };
        let tx = remaining.remove(pos);
        selection.accept(tx, fee);
    }
}

impl Selection {
    fn accept(&mut self, tx: &Transaction, fee: Amount) {
        self.ledger.apply_transaction(tx);
        self.accepted.push(tx.clone());
        self.total_fees = self.total_fees.saturating_add(fee);
    }
}
