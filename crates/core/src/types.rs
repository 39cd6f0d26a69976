//! Ledger data model and table naming.

/// Balance every account is seeded with.
pub const INITIAL_BALANCE: i64 = 1000;

/// Shared append-only audit table.
pub const RECORD_TABLE: &str = "record";

/// One row of a shard's account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account id in `[0, NumAccounts)`
    pub id: i64,
    /// Current balance
    pub balance: i64,
    /// Random-length padding
    pub remark: String,
}

/// One audit row, written only for transfers that moved money.
///
/// Balances are the pre-transfer values seen by the locking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    /// Debited account
    pub from_id: i64,
    /// Credited account
    pub to_id: i64,
    /// Balance of `from_id` before the transfer
    pub from_balance: i64,
    /// Balance of `to_id` before the transfer
    pub to_balance: i64,
    /// Amount moved
    pub amount: i64,
    /// Ordering token
    pub tso: u64,
}

/// Table suffix for a shard: empty for shard 0, the decimal index otherwise.
pub fn table_suffix(shard: usize) -> String {
    if shard == 0 {
        String::new()
    } else {
        shard.to_string()
    }
}

/// Account table name for a shard.
pub fn accounts_table(shard: usize) -> String {
    format!("accounts{}", table_suffix(shard))
}

/// The conserved `sum(balance)` of a shard.
pub fn expected_total(num_accounts: usize) -> i64 {
    num_accounts as i64 * INITIAL_BALANCE
}
