//! bankcheck - transactional consistency harness
//!
//! bankcheck models a bank ledger of N accounts per table, drives many
//! concurrent random transfers against it, and keeps checking that the
//! total balance of every table never changes.
//!
//! # Quick Start
//!
//! ```ignore
//! use bankcheck::{Bank, BankConfig, ConnectionProvider, PoolSizing, RunState, SqliteStore};
//! use std::sync::Arc;
//!
//! let config = BankConfig { num_accounts: 1000, concurrency: 8, ..BankConfig::default() };
//! let sizing = PoolSizing::for_policy(config.connection_policy, 10, config.table_num);
//! let store = Arc::new(SqliteStore::open("bank.db", sizing)?);
//! let provider = ConnectionProvider::new(store, config.connection_policy);
//!
//! let bank = Bank::new(config, provider, Arc::new(RunState::default()))?;
//! bank.initialize()?;
//! bank.execute()?;
//! ```
//!
//! # Architecture
//!
//! - `bankcheck-core`: configuration, errors, run state, data model
//! - `bankcheck-store`: executor contract, dialects, connection policies, SQLite
//! - `bankcheck-engine`: seeding, transfers, verification, the `Bank` lifecycle

pub use bankcheck_core::*;
pub use bankcheck_engine::*;
pub use bankcheck_store::*;
