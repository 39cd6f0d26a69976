//! Balance conservation checks.
//!
//! Each shard gets a fast checker and, with long transactions enabled, a
//! delayed checker that holds its read snapshot open through a delay
//! before summing. A sum mismatch from either is terminal. Other fast
//! checker failures are tolerated until the watchdog window since the
//! last success runs out.

use crate::delay::{DelayInjector, DelayMode};
use bankcheck_core::{
    accounts_table, expected_total, BankConfig, BankError, BankResult, RunState, StoreError,
};
use bankcheck_store::{ConnectionProvider, Transaction, TxMode};
use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Time since the last successful fast check.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    timeout: Duration,
    last_success: Instant,
}

impl Watchdog {
    /// Watchdog whose window starts now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_success: Instant::now(),
        }
    }

    /// Restart the window.
    pub fn record_success(&mut self) {
        self.last_success = Instant::now();
    }

    /// Time since the window last restarted.
    pub fn elapsed(&self) -> Duration {
        self.last_success.elapsed()
    }

    /// Whether the window has run out.
    pub fn expired(&self) -> bool {
        self.elapsed() > self.timeout
    }
}

/// Periodic `sum(balance)` checker for every shard.
pub struct VerificationOracle {
    config: Arc<BankConfig>,
    provider: ConnectionProvider,
    run: Arc<RunState>,
    delay: DelayInjector,
}

impl VerificationOracle {
    /// Oracle sharing the run's provider and state.
    pub fn new(
        config: Arc<BankConfig>,
        provider: ConnectionProvider,
        run: Arc<RunState>,
        delay: DelayInjector,
    ) -> Self {
        Self {
            config,
            provider,
            run,
            delay,
        }
    }

    /// Sum one shard inside a read-only transaction and compare it to
    /// `num_accounts * 1000`.
    ///
    /// Returns the observed total on success.
    ///
    /// # Errors
    ///
    /// `BankError::Inconsistency` on a mismatch; anything else is a
    /// failed check that says nothing about the data.
    pub fn verify(&self, shard: usize, mode: DelayMode) -> BankResult<i64> {
        let table = accounts_table(shard);
        let mut session = self.provider.session()?;
        let mut lease = session.lease()?;
        let mut tx = Transaction::begin(&mut *lease, TxMode::ReadOnly)?;

        if mode == DelayMode::DelayRead {
            self.delay.delay()?;
        }

        let sql = format!("select sum(balance) as total from {}", table);
        let total = match tx.query_row(&sql) {
            Ok(Some(row)) => row.get_i64(0),
            Ok(None) => Err(StoreError::Decode(format!("no row returned by: {}", sql))),
            Err(e) => Err(e),
        }
        .map_err(|e| {
            error!(target: "bank::verify", table = %table, error = %e, "Select sum error");
            e
        })?;

        if let Some(ts_sql) = tx.dialect().current_ts_sql() {
            let row = tx
                .query_row(ts_sql)?
                .ok_or_else(|| StoreError::Decode(format!("no row returned by: {}", ts_sql)))?;
            let tso = row.get_u64(0)?;
            info!(target: "bank::verify", table = %table, tso, "Select sum(balance) to verify");
        }
        // Read-only; a failed commit does not invalidate the sum.
        let _ = tx.commit();

        let expected = expected_total(self.config.num_accounts);
        if total != expected {
            error!(
                target: "bank::verify",
                table = %table,
                expected,
                actual = total,
                "Total balance mismatch"
            );
            return Err(BankError::Inconsistency {
                table,
                expected,
                actual: total,
            });
        }
        Ok(total)
    }

    /// One fast check, applying the watchdog to non-fatal failures.
    ///
    /// `Err` is a terminal verdict.
    pub fn fast_round(&self, shard: usize, watchdog: &mut Watchdog) -> BankResult<()> {
        match self.verify(shard, DelayMode::NoDelay) {
            Ok(_) => {
                watchdog.record_success();
                info!(target: "bank::verify", shard, "Verify success");
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) if e.is_interrupt() => Ok(()),
            Err(e) => {
                info!(target: "bank::verify", shard, error = %e, "Verify error");
                if watchdog.expired() {
                    Err(BankError::WatchdogTimeout {
                        table: accounts_table(shard),
                        elapsed: watchdog.elapsed(),
                        last_error: e.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// One delayed check. Only a mismatch is terminal.
    pub fn delayed_round(&self, shard: usize) -> BankResult<()> {
        match self.verify(shard, DelayMode::DelayRead) {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                info!(target: "bank::verify", shard, error = %e, "Delayed verify error");
                Ok(())
            }
        }
    }

    /// Trip the stop switch and hand the verdict to the supervisor.
    pub fn trip(&self, err: BankError) {
        self.run.stop();
        error!(target: "bank::verify", error = %err, "Stop bank execute");
        self.run.fail(err);
    }

    /// Run one check immediately, then start the shard's cadences.
    ///
    /// A terminal verdict from the immediate check trips the run and
    /// starts nothing.
    pub fn start(self: &Arc<Self>, shard: usize) -> Vec<JoinHandle<()>> {
        match self.verify(shard, DelayMode::NoDelay) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                self.trip(e);
                return Vec::new();
            }
            Err(e) => info!(target: "bank::verify", shard, error = %e, "Initial verify error"),
        }

        let mut handles = Vec::with_capacity(2);
        let oracle = Arc::clone(self);
        handles.push(self.spawn(format!("verify-fast-{}", shard), move || {
            let mut watchdog = Watchdog::new(oracle.config.verify_timeout());
            oracle.cadence(|| oracle.fast_round(shard, &mut watchdog));
        }));

        if self.config.enable_long_txn {
            let oracle = Arc::clone(self);
            handles.push(self.spawn(format!("verify-delayed-{}", shard), move || {
                oracle.cadence(|| oracle.delayed_round(shard));
            }));
        }
        handles
    }

    fn spawn<F>(&self, name: String, f: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(name)
            .spawn(f)
            .expect("failed to spawn verification thread")
    }

    /// Invoke `round` every interval until cancelled or it returns a verdict.
    fn cadence<F>(&self, mut round: F)
    where
        F: FnMut() -> BankResult<()>,
    {
        let ticker = tick(self.config.interval());
        let cancel = self.run.cancel_token();
        loop {
            select! {
                recv(cancel.done()) -> _ => return,
                recv(ticker) -> _ => {
                    if let Err(e) = round() {
                        self.trip(e);
                        return;
                    }
                }
            }
        }
    }
}
