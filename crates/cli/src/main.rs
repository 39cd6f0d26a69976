//! bankcheck: run the bank transfer harness against a SQLite database.
//!
//! `bankcheck [flags]` seeds (or resumes) the account tables, starts
//! verification, and transfers money until a verdict ends the run. The
//! process exits non-zero on any fatal verdict.

mod commands;
mod parse;

use std::process;
use std::sync::Arc;

use bankcheck_core::{BankConfig, BankResult, RunState};
use bankcheck_engine::{worker_count, Bank};
use bankcheck_store::{ConnectionProvider, PoolSizing, SqliteStore};
use tracing::{error, info};

use commands::build_cli;
use parse::{matches_to_options, RunOptions};

fn main() {
    let matches = build_cli().get_matches();

    if matches.get_flag("print-config") {
        print!("{}", BankConfig::default_toml());
        return;
    }

    let options = match matches_to_options(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .with_target(true)
        .init();

    if let Err(e) = run(options) {
        error!(target: "bank::init", error = %e, "Bank run failed");
        process::exit(1);
    }
}

/// Supervisor: the only place a verdict turns into a process exit.
fn run(options: RunOptions) -> BankResult<()> {
    let config = options.config;
    let sizing = PoolSizing::for_policy(
        config.connection_policy,
        worker_count(&config),
        config.table_num,
    );
    let store = Arc::new(SqliteStore::open(&options.db, sizing)?);
    let provider = ConnectionProvider::new(store, config.connection_policy);

    info!(
        target: "bank::init",
        db = %options.db.display(),
        accounts = config.num_accounts,
        tables = config.table_num,
        concurrency = config.concurrency,
        long_txn = config.enable_long_txn,
        pessimistic = config.pessimistic,
        policy = %config.connection_policy,
        "Starting bank"
    );

    let run = Arc::new(RunState::default());
    let bank = Bank::new(config, provider, run)?;
    bank.initialize()?;
    bank.execute()
}
