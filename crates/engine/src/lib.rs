//! Transfer and verification engine for bankcheck
//!
//! This crate drives the harness:
//! - Schema: per-shard reuse-or-reseed with batched concurrent seeding
//! - Transfer: randomized two-account transfers under locking reads
//! - Verify: periodic `sum(balance)` checks with a failure watchdog
//! - Delay: long-transaction injection before the read or the commit
//! - Retry: bounded retry with fixed, cancellable backoff
//!
//! Every task takes the run's `RunState`. Nothing in this crate exits
//! the process; fatal verdicts are returned from `Bank::initialize` and
//! `Bank::execute`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bank;
pub mod delay;
pub mod retry;
pub mod schema;
pub mod transfer;
pub mod verify;

pub use bank::{worker_count, Bank};
pub use delay::{DelayInjector, DelayMode};
pub use retry::{absorb_duplicate, run_with_retry};
pub use schema::{
    batch_starts, insert_batch_sql, load_account, load_records, SchemaInitializer, ShardState,
    BATCH_SIZE, REMARK,
};
pub use transfer::{OrderingClock, Transfer, TransferEngine, TransferOutcome, MAX_AMOUNT};
pub use verify::{VerificationOracle, Watchdog};
