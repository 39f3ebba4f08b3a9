use rust_decimal::Decimal;

use crate::ledger::Transaction;

/// Opening balance plus every amount exactly as stored.
///
/// Amounts already carry their sign, so nothing is reinterpreted by
/// `transaction_type`. Decimal addition is exact, which keeps the result
/// independent of row order.
pub fn compute_balance(opening_balance: Decimal, transactions: &[Transaction]) -> Decimal {
    transactions
        .iter()
        .fold(opening_balance, |acc, tx| acc + tx.amount)
}

/// Stored balance minus computed balance
pub fn drift(stored: Decimal, computed: Decimal) -> Decimal {
    stored - computed
}
