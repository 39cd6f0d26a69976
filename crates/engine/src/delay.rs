//! Long-transaction delay injection.
//!
//! A delay holds the caller's transaction open for a random duration in
//! `[min, max)`. The wait polls on a fixed tick so it notices both the
//! cancellation token and the run's stop switch promptly.

use bankcheck_core::{BankConfig, BankError, BankResult, RunState};
use crossbeam_channel::{select, tick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a transaction pauses, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    /// No pause.
    NoDelay,
    /// Pause after begin, before the first read.
    DelayRead,
    /// Pause before commit, while holding locks.
    DelayCommit,
}

/// Cancellable randomized sleep.
#[derive(Debug, Clone)]
pub struct DelayInjector {
    min: Duration,
    max: Duration,
    tick: Duration,
    run: Arc<RunState>,
}

impl DelayInjector {
    /// Injector with an explicit window and polling tick.
    pub fn new(min: Duration, max: Duration, tick: Duration, run: Arc<RunState>) -> Self {
        Self {
            min,
            max: max.max(min),
            tick,
            run,
        }
    }

    /// Injector using the configured window.
    pub fn from_config(config: &BankConfig, run: Arc<RunState>) -> Self {
        Self::new(config.min_delay(), config.max_delay(), config.delay_tick(), run)
    }

    /// Pick a target duration; each call seeds its own generator.
    fn target(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let mut rng = StdRng::from_entropy();
        rng.gen_range(self.min..self.max)
    }

    /// Sleep for a random duration in the window.
    ///
    /// # Errors
    ///
    /// `BankError::Cancelled` or `BankError::Stopped` as soon as either
    /// signal is observed.
    pub fn delay(&self) -> BankResult<()> {
        let start = Instant::now();
        let target = self.target();
        let ticker = tick(self.tick);
        loop {
            select! {
                recv(self.run.cancel_token().done()) -> _ => return Err(BankError::Cancelled),
                recv(ticker) -> _ => {
                    if self.run.is_stopped() {
                        return Err(BankError::Stopped);
                    }
                    if start.elapsed() > target {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn injector(min_ms: u64, max_ms: u64, run: Arc<RunState>) -> DelayInjector {
        DelayInjector::new(
            Duration::from_millis(min_ms),
            Duration::from_millis(max_ms),
            Duration::from_millis(5),
            run,
        )
    }

    #[test]
    fn test_delay_waits_at_least_min() {
        let run = Arc::new(RunState::default());
        let delay = injector(40, 60, run);
        let start = Instant::now();
        delay.delay().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_target_stays_in_window() {
        let run = Arc::new(RunState::default());
        let delay = injector(100, 200, run);
        for _ in 0..100 {
            let target = delay.target();
            assert!(target >= Duration::from_millis(100));
            assert!(target < Duration::from_millis(200));
        }
    }

    #[test]
    fn test_cancel_interrupts_delay() {
        let run = Arc::new(RunState::default());
        let delay = injector(60_000, 61_000, Arc::clone(&run));
        let canceller = Arc::clone(&run);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel_token().cancel();
        });

        let start = Instant::now();
        assert!(matches!(delay.delay(), Err(BankError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn test_stop_interrupts_delay() {
        let run = Arc::new(RunState::default());
        let delay = injector(60_000, 61_000, Arc::clone(&run));
        run.stop();
        assert!(matches!(delay.delay(), Err(BankError::Stopped)));
    }
}
