//! SQL flavours understood by the engine.
//!
//! Only the statements whose text differs between stores live here; the
//! engine builds the portable ones (counts, sums, `UPDATE ... CASE`)
//! itself.

use crate::connection::TxMode;
use std::fmt;

/// SQL flavour of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite 3 in WAL mode.
    Sqlite,
    /// MySQL / InnoDB.
    MySql,
    /// TiDB: MySQL wire protocol plus `@@tidb_current_ts`.
    TiDb,
}

impl Dialect {
    /// Query returning one row if `table` exists, none otherwise.
    pub fn table_exists_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '{}'",
                table
            ),
            Dialect::MySql | Dialect::TiDb => format!("show tables like '{}'", table),
        }
    }

    /// DDL for a shard's account table.
    pub fn create_accounts_sql(&self, table: &str) -> String {
        format!(
            "create table if not exists {} (id BIGINT PRIMARY KEY, balance BIGINT NOT NULL, remark VARCHAR(128))",
            table
        )
    }

    /// DDL for the shared audit table.
    pub fn create_record_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "create table if not exists {} (id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 from_id BIGINT NOT NULL, \
                 to_id BIGINT NOT NULL, \
                 from_balance BIGINT NOT NULL, \
                 to_balance BIGINT NOT NULL, \
                 amount BIGINT NOT NULL, \
                 tso BIGINT UNSIGNED NOT NULL)",
                table
            ),
            Dialect::MySql | Dialect::TiDb => format!(
                "create table if not exists {} (id BIGINT AUTO_INCREMENT, \
                 from_id BIGINT NOT NULL, \
                 to_id BIGINT NOT NULL, \
                 from_balance BIGINT NOT NULL, \
                 to_balance BIGINT NOT NULL, \
                 amount BIGINT NOT NULL, \
                 tso BIGINT UNSIGNED NOT NULL, \
                 PRIMARY KEY(id))",
                table
            ),
        }
    }

    /// Insert prefix that skips rows whose key already exists.
    pub fn insert_ignore_into(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "INSERT OR IGNORE INTO ",
            Dialect::MySql | Dialect::TiDb => "INSERT IGNORE INTO ",
        }
    }

    /// Clause appended to a select to lock the rows it returns.
    ///
    /// SQLite has no row locks; its locking transactions take the database
    /// write lock at `BEGIN IMMEDIATE` instead.
    pub fn locking_read_suffix(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "",
            Dialect::MySql | Dialect::TiDb => " FOR UPDATE",
        }
    }

    /// Statement opening a transaction.
    ///
    /// Non-locking transactions read from a snapshot taken at begin, so a
    /// delay before the first read still sees the data as of begin.
    pub fn begin_sql(&self, mode: TxMode) -> &'static str {
        match (self, mode) {
            (Dialect::Sqlite, TxMode::Locking) => "BEGIN IMMEDIATE",
            (Dialect::Sqlite, _) => "BEGIN DEFERRED",
            (Dialect::MySql | Dialect::TiDb, TxMode::ReadOnly) => {
                "START TRANSACTION WITH CONSISTENT SNAPSHOT, READ ONLY"
            }
            (Dialect::MySql | Dialect::TiDb, TxMode::ReadWrite) => {
                "START TRANSACTION WITH CONSISTENT SNAPSHOT"
            }
            (Dialect::MySql | Dialect::TiDb, TxMode::Locking) => "BEGIN",
        }
    }

    /// Read run right after begin to pin the snapshot, for stores that
    /// otherwise defer it to the first read.
    ///
    /// SQLite's `BEGIN DEFERRED` opens no read transaction until a table
    /// is touched; `BEGIN IMMEDIATE` already holds the write lock.
    pub fn snapshot_sql(&self, mode: TxMode) -> Option<&'static str> {
        match (self, mode) {
            (Dialect::Sqlite, TxMode::ReadOnly | TxMode::ReadWrite) => {
                Some("SELECT count(*) FROM sqlite_master")
            }
            _ => None,
        }
    }

    /// Query for the current transaction's start timestamp, when the store has one.
    pub fn current_ts_sql(&self) -> Option<&'static str> {
        match self {
            Dialect::TiDb => Some("select @@tidb_current_ts"),
            Dialect::Sqlite | Dialect::MySql => None,
        }
    }

    /// Statements run once before initialization to apply the locking-mode toggle.
    pub fn session_setup_sql(&self, pessimistic: bool) -> Vec<&'static str> {
        match self {
            Dialect::TiDb if pessimistic => vec!["set @@global.tidb_txn_mode = 'pessimistic'"],
            _ => Vec::new(),
        }
    }

    /// Query reporting the effective transaction mode, for logging.
    pub fn txn_mode_sql(&self) -> Option<&'static str> {
        match self {
            Dialect::TiDb => Some("select @@tidb_txn_mode"),
            Dialect::Sqlite | Dialect::MySql => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::TiDb => "tidb",
        };
        f.write_str(name)
    }
}
