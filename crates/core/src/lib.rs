//! Core types for bankcheck
//!
//! This crate defines the foundational pieces shared by every layer:
//! - BankConfig: immutable run parameters, loadable from `bankcheck.toml`
//! - ConnectionPolicy: pooled / dedicated / ephemeral connection lifetimes
//! - Error: `StoreError` for the executor contract, `BankError` for the engine
//! - CancelToken: the single cooperative cancellation signal
//! - RunState: the one-way `stopped` switch and the first fatal verdict
//! - Data model: Account, TransferRecord, shard table naming

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod run_state;
pub mod types;

pub use cancel::CancelToken;
pub use config::{BankConfig, ConnectionPolicy, CONFIG_FILE_NAME};
pub use error::{BankError, BankResult, StoreError, StoreResult};
pub use run_state::RunState;
pub use types::{
    accounts_table, expected_total, table_suffix, Account, TransferRecord, INITIAL_BALANCE,
    RECORD_TABLE,
};
