//! Error types for bankcheck
//!
//! Two layers:
//! - `StoreError`: what the SQL executor contract can report, already
//!   classified by the backend (duplicate key, busy, connection, ...)
//! - `BankError`: what the engine reports to its caller, including the
//!   fatal verdicts that only the top-level supervisor acts on
//!
//! We use `thiserror` for `Display` and `Error` implementations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for executor operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for engine operations
pub type BankResult<T> = std::result::Result<T, BankError>;

/// Errors surfaced by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit an existing primary or unique key
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Lock wait timeout, busy database, or write conflict
    #[error("Store busy: {0}")]
    Busy(String),

    /// Could not acquire or keep a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement rejected or failed for any other reason
    #[error("Statement failed: {0}")]
    Statement(String),

    /// A result column could not be read as the requested type
    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// True when the failure is a duplicate-key violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    /// True for lock-wait and connection failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_) | StoreError::Connection(_))
    }
}

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum BankError {
    /// Executor failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bounded retry gave up
    #[error("Gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: usize,
        /// The last failure observed
        source: Box<BankError>,
    },

    /// Balance conservation violated
    #[error("{table} total must be {expected}, but got {actual}")]
    Inconsistency {
        /// Shard table name
        table: String,
        /// `NumAccounts * 1000`
        expected: i64,
        /// Observed `sum(balance)`
        actual: i64,
    },

    /// Verification kept failing past the watchdog window
    #[error("{table} verification failing for {elapsed:?}, last error: {last_error}")]
    WatchdogTimeout {
        /// Shard table name
        table: String,
        /// Time since the last successful verification
        elapsed: Duration,
        /// Rendered last failure
        last_error: String,
    },

    /// A locking read returned rows that cannot exist
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Cancellation fired during a wait
    #[error("context canceled")]
    Cancelled,

    /// The run's stop switch fired during a wait
    #[error("stopped")]
    Stopped,

    /// Configuration rejected by validation or parsing
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl BankError {
    /// True for verdicts that must terminate the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BankError::Inconsistency { .. }
                | BankError::WatchdogTimeout { .. }
                | BankError::Corruption(_)
        )
    }

    /// True for the cancellation and stop interruptions.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, BankError::Cancelled | BankError::Stopped)
    }

    /// True for store failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, BankError::Store(e) if e.is_transient())
    }
}
