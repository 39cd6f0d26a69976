//! Shard bootstrap: reuse an intact shard, otherwise drop, recreate and seed.
//!
//! A shard whose account table already holds exactly `num_accounts` rows
//! is left alone so a run can resume against the previous run's data.
//! Any other row count is taken as a leftover of an incomplete run: the
//! shard table and the shared audit table are dropped and reseeded.
//!
//! Seeding pushes batch offsets onto a bounded queue drained by
//! `concurrency` workers, each issuing one multi-row insert per batch
//! through [`run_with_retry`].

use crate::retry::{absorb_duplicate, run_with_retry};
use bankcheck_core::{
    accounts_table, Account, BankConfig, BankError, BankResult, RunState, StoreError,
    TransferRecord, INITIAL_BALANCE, RECORD_TABLE,
};
use bankcheck_store::{Connection, ConnectionProvider, Dialect, Session};
use crossbeam_channel::{bounded, select, Receiver};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// Rows per seeding insert.
pub const BATCH_SIZE: usize = 100;

/// Padding source for the `remark` column; each row takes a random prefix.
pub const REMARK: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXVZabcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXVZlkjsanksqiszndqpijdslnnq";

/// What the probe found for a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    /// No account table.
    Missing,
    /// Exactly `num_accounts` rows; reuse as is.
    Resumable,
    /// Table present with the wrong row count.
    Mismatched {
        /// Rows found
        count: i64,
    },
}

/// Offsets of every seeding batch covering `[0, num_accounts)`.
pub fn batch_starts(num_accounts: usize) -> Vec<usize> {
    (0..num_accounts).step_by(BATCH_SIZE).collect()
}

/// One multi-row insert seeding `count` accounts from `start`.
pub fn insert_batch_sql<R: Rng + ?Sized>(
    dialect: Dialect,
    table: &str,
    start: usize,
    count: usize,
    rng: &mut R,
) -> String {
    let mut sql = String::with_capacity(64 + count * 50);
    sql.push_str(dialect.insert_ignore_into());
    sql.push_str(table);
    sql.push_str(" (id, balance, remark) VALUES ");
    for i in 0..count {
        if i > 0 {
            sql.push(',');
        }
        let remark_len = rng.gen_range(0..REMARK.len());
        sql.push_str(&format!(
            "({}, {}, '{}')",
            start + i,
            INITIAL_BALANCE,
            &REMARK[..remark_len]
        ));
    }
    sql
}

fn single_row(conn: &mut dyn Connection, sql: &str) -> BankResult<bankcheck_store::Row> {
    conn.query_row(sql)?
        .ok_or_else(|| StoreError::Decode(format!("no row returned by: {}", sql)).into())
}

/// Creates and seeds shard tables.
pub struct SchemaInitializer {
    config: Arc<BankConfig>,
    provider: ConnectionProvider,
    run: Arc<RunState>,
}

impl SchemaInitializer {
    /// Initializer sharing the run's provider and state.
    pub fn new(config: Arc<BankConfig>, provider: ConnectionProvider, run: Arc<RunState>) -> Self {
        Self {
            config,
            provider,
            run,
        }
    }

    /// Inspect a shard's account table.
    pub fn probe(&self, conn: &mut dyn Connection, shard: usize) -> BankResult<ShardState> {
        let table = accounts_table(shard);
        let exists = conn.dialect().table_exists_sql(&table);
        if conn.query_row(&exists)?.is_none() {
            return Ok(ShardState::Missing);
        }

        let row = single_row(conn, &format!("select count(*) as count from {}", table))?;
        let count = row.get_i64(0)?;
        if count == self.config.num_accounts as i64 {
            Ok(ShardState::Resumable)
        } else {
            Ok(ShardState::Mismatched { count })
        }
    }

    /// Drop leftovers if needed and create the tables.
    ///
    /// Returns `true` when the shard must be seeded.
    pub fn prepare(&self, conn: &mut dyn Connection, shard: usize) -> BankResult<bool> {
        let table = accounts_table(shard);
        match self.probe(conn, shard)? {
            ShardState::Resumable => return Ok(false),
            ShardState::Missing => {}
            ShardState::Mismatched { count } => {
                info!(
                    target: "bank::init",
                    table = %table,
                    expected = self.config.num_accounts,
                    found = count,
                    "Row count mismatch, re-initializing the data"
                );
                conn.exec(&format!("drop table if exists {}", table))?;
                conn.exec(&format!("DROP TABLE IF EXISTS {}", RECORD_TABLE))?;
            }
        }

        let dialect = conn.dialect();
        conn.exec(&dialect.create_accounts_sql(&table))?;
        conn.exec(&dialect.create_record_sql(RECORD_TABLE))?;
        Ok(true)
    }

    /// Bring one shard to a verified-ready state.
    ///
    /// Probe and DDL use one lease of `session`; seeding workers open
    /// their own sessions.
    pub fn init_shard(&self, session: &mut dyn Session, shard: usize) -> BankResult<()> {
        let needs_seed = {
            let mut lease = session.lease()?;
            self.prepare(&mut *lease, shard)?
        };
        if needs_seed {
            self.seed(shard)?;
        }
        Ok(())
    }

    /// Seed a freshly created shard table.
    ///
    /// Returns `Ok(())` on cancellation, leaving the shard partially
    /// seeded; the next run's probe detects and redoes it.
    pub fn seed(&self, shard: usize) -> BankResult<()> {
        let table = accounts_table(shard);
        let starts = batch_starts(self.config.num_accounts);
        let (jobs_tx, jobs_rx) = bounded::<usize>(starts.len().max(1));
        let cancel = self.run.cancel_token();
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<BankError>> = Mutex::new(None);

        thread::scope(|scope| {
            scope.spawn(move || {
                for start in starts {
                    if cancel.is_cancelled() {
                        return;
                    }
                    select! {
                        recv(cancel.done()) -> _ => return,
                        send(jobs_tx, start) -> sent => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            });

            for _ in 0..self.config.concurrency {
                let jobs = jobs_rx.clone();
                let (table, abort, first_error) = (&table, &abort, &first_error);
                scope.spawn(move || {
                    if let Err(e) = self.seed_worker(table, jobs, abort) {
                        abort.store(true, Ordering::Release);
                        first_error.lock().get_or_insert(e);
                    }
                });
            }
        });

        if let Some(e) = first_error.into_inner() {
            return Err(e);
        }
        if cancel.is_cancelled() {
            warn!(target: "bank::init", table = %table, "Seeding cancelled");
        }
        Ok(())
    }

    fn seed_worker(&self, table: &str, jobs: Receiver<usize>, abort: &AtomicBool) -> BankResult<()> {
        let cancel = self.run.cancel_token();
        let mut session = self.provider.session()?;
        let dialect = self.provider.dialect();
        let mut rng = StdRng::from_entropy();

        loop {
            if abort.load(Ordering::Acquire) || cancel.is_cancelled() {
                return Ok(());
            }
            let start = select! {
                recv(cancel.done()) -> _ => return Ok(()),
                recv(jobs) -> job => match job {
                    Ok(start) => start,
                    Err(_) => return Ok(()),
                },
            };

            let began = Instant::now();
            let count = BATCH_SIZE.min(self.config.num_accounts - start);
            let sql = insert_batch_sql(dialect, table, start, count, &mut rng);
            run_with_retry(
                cancel,
                self.config.retry_limit,
                self.config.retry_interval(),
                || {
                    let mut lease = session.lease()?;
                    absorb_duplicate(lease.exec(&sql))?;
                    Ok(())
                },
            )?;
            info!(
                target: "bank::seed",
                table = %table,
                start,
                count,
                elapsed = ?began.elapsed(),
                "Inserted accounts"
            );
        }
    }
}

/// Read one account row.
pub fn load_account(
    conn: &mut dyn Connection,
    shard: usize,
    id: i64,
) -> BankResult<Option<Account>> {
    let sql = format!(
        "select id, balance, remark from {} where id = {}",
        accounts_table(shard),
        id
    );
    match conn.query_row(&sql)? {
        None => Ok(None),
        Some(row) => Ok(Some(Account {
            id: row.get_i64(0)?,
            balance: row.get_i64(1)?,
            remark: row.get_str(2).map(str::to_string).unwrap_or_default(),
        })),
    }
}

/// Read the whole audit log in insertion order.
pub fn load_records(conn: &mut dyn Connection) -> BankResult<Vec<TransferRecord>> {
    let sql = format!(
        "select from_id, to_id, from_balance, to_balance, amount, tso from {} order by id",
        RECORD_TABLE
    );
    conn.query(&sql)?
        .iter()
        .map(|row| -> BankResult<TransferRecord> {
            Ok(TransferRecord {
                from_id: row.get_i64(0)?,
                to_id: row.get_i64(1)?,
                from_balance: row.get_i64(2)?,
                to_balance: row.get_i64(3)?,
                amount: row.get_i64(4)?,
                tso: row.get_u64(5)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_batch_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let sql = insert_batch_sql(Dialect::MySql, "accounts2", 200, 3, &mut rng);
        assert!(sql.starts_with("INSERT IGNORE INTO accounts2 (id, balance, remark) VALUES (200, 1000, '"));
        assert!(sql.contains("(201, 1000, '"));
        assert!(sql.contains("(202, 1000, '"));
        assert!(!sql.contains("(203,"));
        assert_eq!(sql.matches("),(").count(), 2);
    }

    #[test]
    fn test_sqlite_insert_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        let sql = insert_batch_sql(Dialect::Sqlite, "accounts", 0, 1, &mut rng);
        assert!(sql.starts_with("INSERT OR IGNORE INTO accounts "));
    }

    #[test]
    fn test_remark_fits_column() {
        assert_eq!(REMARK.len(), 128);
    }

    proptest! {
        #[test]
        fn batches_cover_every_account_once(num_accounts in 1usize..5_000) {
            let starts = batch_starts(num_accounts);
            let mut covered = 0usize;
            for (i, start) in starts.iter().enumerate() {
                prop_assert_eq!(*start, i * BATCH_SIZE);
                covered += BATCH_SIZE.min(num_accounts - start);
            }
            prop_assert_eq!(covered, num_accounts);
        }
    }
}
