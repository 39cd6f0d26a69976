//! The bank harness: bootstrap, then run the workload until cancelled.
//!
//! `Bank` owns the shared pieces of a run and exposes the two lifecycle
//! entry points. Fatal verdicts from any task land in the `RunState`;
//! both entry points hand them back to the caller, which decides how the
//! process exits.

use crate::delay::{DelayInjector, DelayMode};
use crate::schema::SchemaInitializer;
use crate::transfer::TransferEngine;
use crate::verify::VerificationOracle;
use bankcheck_core::{BankConfig, BankResult, RunState};
use bankcheck_store::ConnectionProvider;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Long-lived transfer workers for `config`: the plain pool plus one
/// delayed-read and one delayed-commit worker in long-transaction mode.
pub fn worker_count(config: &BankConfig) -> usize {
    if config.enable_long_txn {
        config.concurrency + 2
    } else {
        config.concurrency
    }
}

/// One harness run against one store.
pub struct Bank {
    config: Arc<BankConfig>,
    provider: ConnectionProvider,
    run: Arc<RunState>,
    schema: SchemaInitializer,
    engine: Arc<TransferEngine>,
    oracle: Arc<VerificationOracle>,
    verifiers: Mutex<Vec<JoinHandle<()>>>,
}

impl Bank {
    /// Build a run from validated configuration.
    ///
    /// # Errors
    ///
    /// `BankError::InvalidConfig` if the configuration is rejected.
    pub fn new(
        config: BankConfig,
        provider: ConnectionProvider,
        run: Arc<RunState>,
    ) -> BankResult<Self> {
        let config = config.normalized();
        config.validate()?;
        let config = Arc::new(config);

        let delay = DelayInjector::from_config(&config, Arc::clone(&run));
        let schema = SchemaInitializer::new(Arc::clone(&config), provider.clone(), Arc::clone(&run));
        let engine = Arc::new(TransferEngine::new(
            Arc::clone(&config),
            Arc::clone(&run),
            delay.clone(),
        ));
        let oracle = Arc::new(VerificationOracle::new(
            Arc::clone(&config),
            provider.clone(),
            Arc::clone(&run),
            delay,
        ));

        Ok(Self {
            config,
            provider,
            run,
            schema,
            engine,
            oracle,
            verifiers: Mutex::new(Vec::new()),
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Shard bootstrap.
    pub fn schema(&self) -> &SchemaInitializer {
        &self.schema
    }

    /// Transfer workload.
    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// Conservation checker.
    pub fn oracle(&self) -> &Arc<VerificationOracle> {
        &self.oracle
    }

    /// Shared run state.
    pub fn run_state(&self) -> &Arc<RunState> {
        &self.run
    }

    /// Bring every shard to a ready state and start its verification.
    ///
    /// Reuses intact shards. Returns once all shards are ready, or early
    /// (with `Ok`) if cancelled.
    ///
    /// # Errors
    ///
    /// Any DDL or probe failure, an exhausted seeding retry, or a fatal
    /// verdict from the initial verification.
    pub fn initialize(&self) -> BankResult<()> {
        info!(target: "bank::init", "Start to init...");
        let result = self.initialize_shards();
        info!(target: "bank::init", "Init end...");
        result
    }

    fn initialize_shards(&self) -> BankResult<()> {
        self.prepare_session()?;
        let mut session = self.provider.session()?;

        for shard in 0..self.config.table_num {
            if self.run.is_cancelled() {
                break;
            }
            self.schema.init_shard(session.as_mut(), shard)?;
            if self.run.is_cancelled() {
                warn!(target: "bank::init", shard, "Bank initialize is cancelled");
                break;
            }
            let handles = self.oracle.start(shard);
            self.verifiers.lock().extend(handles);
        }

        match self.run.take_fatal() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply the locking-mode toggle and log the effective mode.
    fn prepare_session(&self) -> BankResult<()> {
        let dialect = self.provider.dialect();
        let setup = dialect.session_setup_sql(self.config.pessimistic);
        let mode_sql = match dialect.txn_mode_sql() {
            Some(sql) => sql,
            None => {
                info!(
                    target: "bank::init",
                    dialect = %dialect,
                    pessimistic = self.config.pessimistic,
                    "Transaction mode"
                );
                return Ok(());
            }
        };

        let mut session = self.provider.session()?;
        let mut lease = session.lease()?;
        for sql in setup {
            lease.exec(sql)?;
        }
        match lease.query_row(mode_sql) {
            Ok(Some(row)) => {
                let mode = row.get_str(0).unwrap_or("unknown").to_string();
                info!(target: "bank::init", dialect = %dialect, txn_mode = %mode, "Transaction mode");
            }
            Ok(None) => {}
            Err(e) => warn!(target: "bank::init", error = %e, "Failed to read transaction mode"),
        }
        Ok(())
    }

    /// Run the transfer workload until cancellation.
    ///
    /// # Errors
    ///
    /// The fatal verdict that ended the run, if any.
    pub fn execute(&self) -> BankResult<()> {
        info!(target: "bank::transfer", "Start to test...");

        let mut modes = vec![DelayMode::NoDelay; self.config.concurrency];
        if self.config.enable_long_txn {
            modes.push(DelayMode::DelayRead);
            modes.push(DelayMode::DelayCommit);
        }

        thread::scope(|scope| {
            for (i, mode) in modes.into_iter().enumerate() {
                let (engine, provider, run) = (&self.engine, &self.provider, &self.run);
                thread::Builder::new()
                    .name(format!("transfer-{}", i))
                    .spawn_scoped(scope, move || {
                        if let Err(e) = engine.run(provider, mode) {
                            error!(target: "bank::transfer", error = %e, ?mode, "Transfer worker failed");
                            run.fail(e);
                        }
                    })
                    .expect("failed to spawn transfer thread");
            }
        });

        self.join_verifiers();
        info!(target: "bank::transfer", "Test end...");
        match self.run.take_fatal() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn join_verifiers(&self) {
        let handles = std::mem::take(&mut *self.verifiers.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!(target: "bank::verify", "Verification thread panicked");
            }
        }
    }

    /// Cancel the run and wait for verification threads.
    pub fn shutdown(&self) {
        self.run.cancel_token().cancel();
        self.join_verifiers();
    }
}

impl Drop for Bank {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count() {
        let mut config = BankConfig {
            concurrency: 8,
            ..BankConfig::default()
        };
        assert_eq!(worker_count(&config), 10);
        config.enable_long_txn = false;
        assert_eq!(worker_count(&config), 8);
    }
}
