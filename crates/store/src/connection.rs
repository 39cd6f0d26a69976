//! The executor contract.
//!
//! A `Connection` runs literal SQL and returns rows. Transactions are
//! driven with the dialect's own `BEGIN` / `COMMIT` / `ROLLBACK`
//! statements, so any backend that can execute SQL gets transactions for
//! free.

use crate::dialect::Dialect;
use crate::value::Row;
use bankcheck_core::StoreResult;

/// Intent of a transaction, mapped to a begin statement by the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes; conflicts are detected by the store.
    ReadWrite,
    /// Reads and writes with locks taken eagerly.
    Locking,
}

/// A single store connection.
pub trait Connection: Send {
    /// SQL flavour of this connection.
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the number of affected rows.
    fn exec(&mut self, sql: &str) -> StoreResult<u64>;

    /// Run a query and collect all rows.
    fn query(&mut self, sql: &str) -> StoreResult<Vec<Row>>;

    /// Run a query and return its first row, if any.
    fn query_row(&mut self, sql: &str) -> StoreResult<Option<Row>> {
        Ok(self.query(sql)?.into_iter().next())
    }
}

/// An open transaction borrowing its connection.
///
/// Dropping without `commit` rolls back.
pub struct Transaction<'c> {
    conn: &'c mut dyn Connection,
    finished: bool,
}

impl<'c> Transaction<'c> {
    /// Open a transaction on `conn`.
    ///
    /// Non-locking transactions have their snapshot in place on return.
    pub fn begin(conn: &'c mut dyn Connection, mode: TxMode) -> StoreResult<Self> {
        let dialect = conn.dialect();
        conn.exec(dialect.begin_sql(mode))?;
        let mut tx = Self {
            conn,
            finished: false,
        };
        if let Some(sql) = dialect.snapshot_sql(mode) {
            tx.conn.query(sql)?;
        }
        Ok(tx)
    }

    /// SQL flavour of the underlying connection.
    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    /// Execute a statement inside the transaction.
    pub fn exec(&mut self, sql: &str) -> StoreResult<u64> {
        self.conn.exec(sql)
    }

    /// Run a query inside the transaction.
    pub fn query(&mut self, sql: &str) -> StoreResult<Vec<Row>> {
        self.conn.query(sql)
    }

    /// Run a query inside the transaction and return its first row.
    pub fn query_row(&mut self, sql: &str) -> StoreResult<Option<Row>> {
        self.conn.query_row(sql)
    }

    /// Commit. On failure the transaction is rolled back when dropped.
    pub fn commit(mut self) -> StoreResult<()> {
        self.conn.exec("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // The store may already have aborted the transaction.
            let _ = self.conn.exec("ROLLBACK");
        }
    }
}
