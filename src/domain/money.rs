/// Balances and transaction amounts are whole units stored as signed integers.
pub type Amount = i64;

/// True when a balance covers a debit of `amount`.
pub fn covers(balance: Amount, amount: Amount) -> bool {
    amount <= balance
}
