//! Shared helpers for the engine integration suites.
//!
//! Import via `mod common;`. Every harness runs against a fresh SQLite
//! file in a temporary directory.

#![allow(dead_code)]

use bankcheck_core::{accounts_table, BankConfig, ConnectionPolicy, RunState, RECORD_TABLE};
use bankcheck_engine::{worker_count, Bank};
use bankcheck_store::{ConnectionProvider, PoolSizing, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Small, fast configuration: long transactions off, row locking on.
pub fn small_config(num_accounts: usize) -> BankConfig {
    BankConfig {
        num_accounts,
        table_num: 1,
        concurrency: 4,
        interval_ms: 50,
        enable_long_txn: false,
        pessimistic: true,
        retry_limit: 20,
        retry_interval_ms: 10,
        verify_timeout_ms: 60_000,
        long_txn_delay_ms: 40,
        long_txn_jitter_ms: 10,
        delay_tick_ms: 5,
        acquire_backoff_ms: 10,
        ..BankConfig::default()
    }
}

/// A store, a provider and a run state over one temporary database.
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub provider: ConnectionProvider,
    pub run: Arc<RunState>,
    pub dir: TempDir,
}

impl Harness {
    /// Fresh database sized for `config`.
    pub fn new(config: &BankConfig) -> Self {
        let dir = TempDir::new().unwrap();
        Self::open(dir, config)
    }

    /// Reopen the database in `dir` sized for `config`.
    pub fn open(dir: TempDir, config: &BankConfig) -> Self {
        let sizing = PoolSizing::for_policy(
            config.connection_policy,
            worker_count(config),
            config.table_num,
        );
        let store = Arc::new(SqliteStore::open(dir.path().join("bank.db"), sizing).unwrap());
        let provider = ConnectionProvider::new(store.clone(), config.connection_policy);
        Self {
            store,
            provider,
            run: Arc::new(RunState::default()),
            dir,
        }
    }

    /// A bank over this harness.
    pub fn bank(&self, config: &BankConfig) -> Bank {
        Bank::new(config.clone(), self.provider.clone(), Arc::clone(&self.run)).unwrap()
    }

    /// Run `sql` on a pooled connection.
    pub fn exec(&self, sql: &str) -> u64 {
        let provider = ConnectionProvider::new(self.store.clone(), ConnectionPolicy::Pooled);
        let mut session = provider.session().unwrap();
        let mut lease = session.lease().unwrap();
        lease.exec(sql).unwrap()
    }

    /// Single integer from `sql`.
    pub fn scalar(&self, sql: &str) -> i64 {
        let provider = ConnectionProvider::new(self.store.clone(), ConnectionPolicy::Pooled);
        let mut session = provider.session().unwrap();
        let mut lease = session.lease().unwrap();
        lease.query_row(sql).unwrap().unwrap().get_i64(0).unwrap()
    }

    pub fn sum(&self, shard: usize) -> i64 {
        self.scalar(&format!("select sum(balance) from {}", accounts_table(shard)))
    }

    pub fn count(&self, shard: usize) -> i64 {
        self.scalar(&format!("select count(*) from {}", accounts_table(shard)))
    }

    pub fn balance(&self, shard: usize, id: i64) -> i64 {
        self.scalar(&format!(
            "select balance from {} where id = {}",
            accounts_table(shard),
            id
        ))
    }

    pub fn set_balance(&self, shard: usize, id: i64, balance: i64) {
        self.exec(&format!(
            "update {} set balance = {} where id = {}",
            accounts_table(shard),
            balance,
            id
        ));
    }

    pub fn record_count(&self) -> i64 {
        self.scalar(&format!("select count(*) from {}", RECORD_TABLE))
    }

    /// Seed every shard without starting verification.
    pub fn seed(&self, bank: &Bank) {
        let mut session = self.provider.session().unwrap();
        for shard in 0..bank.config().table_num {
            bank.schema().init_shard(session.as_mut(), shard).unwrap();
        }
    }
}
