//! Store layer for bankcheck
//!
//! The engine talks to the store under test only through this crate:
//! - `Connection` / `Transaction`: the narrow executor contract
//!   (begin, exec, query_row, query)
//! - `Dialect`: every statement the engine issues, per SQL flavour
//! - `ConnectionProvider`: one factory, three `Session` adapters matching
//!   the pooled / dedicated / ephemeral connection policies
//! - `SqliteStore`: a concrete backend over rusqlite with an r2d2 pool

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod dialect;
pub mod provider;
pub mod sqlite;
pub mod value;

pub use connection::{Connection, Transaction, TxMode};
pub use dialect::Dialect;
pub use provider::{ConnectionProvider, Lease, PoolSizing, Session, Store};
pub use sqlite::SqliteStore;
pub use value::{Row, Value};
