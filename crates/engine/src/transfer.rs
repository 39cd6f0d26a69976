//! The steady-state workload: randomized two-account transfers.
//!
//! One transfer is one transaction:
//!
//! 1. locking read of both accounts in a single statement
//! 2. if the debit is covered, one `UPDATE ... CASE` moving the amount,
//!    then one audit row carrying the pre-transfer balances
//! 3. commit
//!
//! An uncovered debit commits without writing anything. A failed commit
//! is dropped; only verification may declare the run broken.

use crate::delay::{DelayInjector, DelayMode};
use bankcheck_core::{
    accounts_table, BankConfig, BankError, BankResult, RunState, StoreError, TransferRecord,
    RECORD_TABLE,
};
use bankcheck_store::{Connection, ConnectionProvider, Row, Transaction, TxMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Exclusive upper bound of a transfer amount.
pub const MAX_AMOUNT: i64 = 999;

/// One randomized transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Debited account
    pub from: i64,
    /// Credited account
    pub to: i64,
    /// Shard index
    pub shard: usize,
    /// Amount in `[0, MAX_AMOUNT)`
    pub amount: i64,
}

/// Result of a committed transfer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Money moved; the audit row that was written.
    Moved(TransferRecord),
    /// Debit not covered; nothing written.
    Skipped {
        /// Balance of `from` at the locking read
        from_balance: i64,
        /// Balance of `to` at the locking read
        to_balance: i64,
    },
}

/// Strictly increasing wall-clock nanoseconds, used as the ordering
/// token when the store exposes no transaction timestamp.
#[derive(Debug, Default)]
pub struct OrderingClock {
    last: AtomicU64,
}

impl OrderingClock {
    /// New clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next token; never repeats within the process.
    pub fn next(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Executes transfers against the shard tables.
pub struct TransferEngine {
    config: Arc<BankConfig>,
    tables: Vec<String>,
    run: Arc<RunState>,
    delay: DelayInjector,
    clock: OrderingClock,
}

impl TransferEngine {
    /// Engine for the configured shards.
    pub fn new(config: Arc<BankConfig>, run: Arc<RunState>, delay: DelayInjector) -> Self {
        let tables = (0..config.table_num).map(accounts_table).collect();
        Self {
            config,
            tables,
            run,
            delay,
            clock: OrderingClock::new(),
        }
    }

    /// Draw a transfer with `from != to`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Transfer {
        let accounts = self.config.num_accounts as i64;
        let (from, to) = loop {
            let from = rng.gen_range(0..accounts);
            let to = rng.gen_range(0..accounts);
            if from != to {
                break (from, to);
            }
        };
        let shard = rng.gen_range(0..self.tables.len());
        let amount = rng.gen_range(0..MAX_AMOUNT);
        Transfer {
            from,
            to,
            shard,
            amount,
        }
    }

    /// Pull both balances out of the locking read.
    ///
    /// Anything other than exactly the two requested ids is corruption.
    fn locked_balances(&self, transfer: &Transfer, rows: &[Row]) -> BankResult<(i64, i64)> {
        let mut from_balance = None;
        let mut to_balance = None;
        for row in rows {
            let id = row.get_i64(0)?;
            let balance = row.get_i64(1)?;
            if id == transfer.from {
                from_balance = Some(balance);
            } else if id == transfer.to {
                to_balance = Some(balance);
            } else {
                error!(target: "bank::transfer", id, "Got unexpected account");
                return Err(BankError::Corruption(format!(
                    "got unexpected account {}",
                    id
                )));
            }
        }

        match (from_balance, to_balance) {
            (Some(from_balance), Some(to_balance)) if rows.len() == 2 => {
                Ok((from_balance, to_balance))
            }
            _ => {
                error!(
                    target: "bank::transfer",
                    from = transfer.from,
                    to = transfer.to,
                    count = rows.len(),
                    "Locking read returned an invalid row set"
                );
                Err(BankError::Corruption(format!(
                    "select {}({:?}) -> {}({:?}) invalid count {}",
                    transfer.from,
                    from_balance,
                    transfer.to,
                    to_balance,
                    rows.len()
                )))
            }
        }
    }

    fn ordering_token(&self, tx: &mut Transaction<'_>) -> BankResult<u64> {
        match tx.dialect().current_ts_sql() {
            Some(sql) => {
                let row = tx
                    .query_row(sql)?
                    .ok_or_else(|| StoreError::Decode(format!("no row returned by: {}", sql)))?;
                Ok(row.get_u64(0)?)
            }
            None => Ok(self.clock.next()),
        }
    }

    /// Run one transfer transaction on `conn`.
    ///
    /// # Errors
    ///
    /// `BankError::Corruption` for an impossible locking read; any other
    /// error means this attempt was abandoned and rolled back.
    pub fn transfer(
        &self,
        conn: &mut dyn Connection,
        transfer: &Transfer,
        mode: DelayMode,
    ) -> BankResult<TransferOutcome> {
        let table = &self.tables[transfer.shard];
        let tx_mode = if self.config.pessimistic {
            TxMode::Locking
        } else {
            TxMode::ReadWrite
        };
        let mut tx = Transaction::begin(conn, tx_mode)?;

        if mode == DelayMode::DelayRead {
            self.delay.delay()?;
        }

        let select = format!(
            "SELECT id, balance FROM {} WHERE id IN ({}, {}){}",
            table,
            transfer.from,
            transfer.to,
            tx.dialect().locking_read_suffix()
        );
        let rows = tx.query(&select)?;
        let (from_balance, to_balance) = self.locked_balances(transfer, &rows)?;

        let moved = if from_balance >= transfer.amount {
            let update = format!(
                "UPDATE {} SET balance = CASE id WHEN {} THEN {} WHEN {} THEN {} END WHERE id IN ({}, {})",
                table,
                transfer.to,
                to_balance + transfer.amount,
                transfer.from,
                from_balance - transfer.amount,
                transfer.from,
                transfer.to
            );
            tx.exec(&update)?;

            let record = TransferRecord {
                from_id: transfer.from,
                to_id: transfer.to,
                from_balance,
                to_balance,
                amount: transfer.amount,
                tso: self.ordering_token(&mut tx)?,
            };
            tx.exec(&format!(
                "INSERT INTO {} (from_id, to_id, from_balance, to_balance, amount, tso) VALUES ({}, {}, {}, {}, {}, {})",
                RECORD_TABLE,
                record.from_id,
                record.to_id,
                record.from_balance,
                record.to_balance,
                record.amount,
                record.tso
            ))?;
            info!(target: "bank::transfer", sql = %update, "Exec pre");
            Some((record, update))
        } else {
            None
        };

        if mode == DelayMode::DelayCommit {
            self.delay.delay()?;
        }

        let committed = tx.commit();
        match moved {
            Some((record, update)) => match committed {
                Ok(()) => {
                    info!(target: "bank::transfer", sql = %update, "Exec commit success");
                    Ok(TransferOutcome::Moved(record))
                }
                Err(e) => {
                    info!(target: "bank::transfer", sql = %update, error = %e, "Exec commit error");
                    Err(e.into())
                }
            },
            None => {
                committed?;
                Ok(TransferOutcome::Skipped {
                    from_balance,
                    to_balance,
                })
            }
        }
    }

    /// Worker loop: transfer until cancelled or stopped.
    ///
    /// Returns `Err` only for fatal verdicts or when a dedicated
    /// connection cannot be checked out.
    pub fn run(&self, provider: &ConnectionProvider, mode: DelayMode) -> BankResult<()> {
        let cancel = self.run.cancel_token();
        let mut session = provider.session()?;
        let mut rng = StdRng::from_entropy();

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            if self.run.is_stopped() {
                error!(target: "bank::transfer", "Bank stopped");
                return Ok(());
            }

            let transfer = self.draw(&mut rng);
            let mut lease = match session.lease() {
                Ok(lease) => lease,
                Err(e) => {
                    warn!(target: "bank::transfer", error = %e, "Failed to get connection");
                    if !cancel.sleep(self.config.acquire_backoff()) {
                        return Ok(());
                    }
                    continue;
                }
            };

            match self.transfer(&mut *lease, &transfer, mode) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(target: "bank::transfer", error = %e, ?transfer, "Transfer attempt dropped")
                }
            }
        }
    }
}
