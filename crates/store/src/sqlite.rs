//! SQLite backend (rusqlite + r2d2).
//!
//! The database runs in WAL mode so readers keep a stable snapshot while
//! writers commit. Every connection gets a busy timeout, turning lock
//! waits into `StoreError::Busy` only after the timeout expires.

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::provider::{PoolSizing, Store};
use crate::value::{Row, Value};
use bankcheck_core::{StoreError, StoreResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::ErrorCode;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// How long a statement waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a checkout waits for a free pooled connection.
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

fn configure(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Map a driver error onto the executor taxonomy.
pub(crate) fn classify(err: rusqlite::Error) -> StoreError {
    let message = err.to_string();
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::DuplicateKey(message)
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy(message),
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure => {
                StoreError::Connection(message)
            }
            _ => StoreError::Statement(message),
        },
        _ => StoreError::Statement(message),
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

/// A SQLite connection, pooled or owned.
pub struct SqliteConnection<C> {
    conn: C,
}

impl<C> Connection for SqliteConnection<C>
where
    C: DerefMut<Target = rusqlite::Connection> + Send,
{
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn exec(&mut self, sql: &str) -> StoreResult<u64> {
        let changed = self.conn.execute(sql, []).map_err(classify)?;
        Ok(changed as u64)
    }

    fn query(&mut self, sql: &str) -> StoreResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([]).map_err(classify)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(classify)? {
            let mut values = Vec::with_capacity(columns);
            for idx in 0..columns {
                values.push(to_value(row.get_ref(idx).map_err(classify)?));
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }
}

/// A SQLite database file behind an r2d2 pool.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    sizing: PoolSizing,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>, sizing: PoolSizing) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path).with_init(configure);
        let pool = Pool::builder()
            .max_size(sizing.max_open.max(1))
            .min_idle(Some(sizing.max_idle.min(sizing.max_open.max(1))))
            .max_lifetime(Some(sizing.max_lifetime))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .build(manager)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            target: "bank::store",
            path = %path.display(),
            max_open = sizing.max_open,
            max_idle = sizing.max_idle,
            max_lifetime = ?sizing.max_lifetime,
            "SQLite store opened"
        );

        Ok(Self { pool, path, sizing })
    }

    /// Pool limits in effect.
    pub fn sizing(&self) -> PoolSizing {
        self.sizing
    }
}

impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn checkout(&self) -> StoreResult<Box<dyn Connection>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Box::new(SqliteConnection { conn }))
    }

    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        let mut conn = rusqlite::Connection::open(&self.path).map_err(classify)?;
        configure(&mut conn).map_err(classify)?;
        Ok(Box::new(SqliteConnection {
            conn: Box::new(conn),
        }))
    }
}
