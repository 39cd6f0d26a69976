//! Process-wide run state.
//!
//! `stopped` is the one-way kill switch tripped only by verification.
//! `fail` records the first fatal verdict and cancels the run so every
//! task unwinds; the top-level supervisor reads it back with
//! `take_fatal` and alone decides how the process exits.

use crate::cancel::CancelToken;
use crate::error::BankError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared state of one harness run.
#[derive(Debug)]
pub struct RunState {
    stopped: AtomicBool,
    cancel: CancelToken,
    fatal: Mutex<Option<BankError>>,
}

impl RunState {
    /// Create a run bound to `cancel`.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            cancel,
            fatal: Mutex::new(None),
        }
    }

    /// The run's cancellation signal.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Whether cancellation has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Trip the stop switch. Never reset.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether the stop switch has tripped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Record a fatal verdict and cancel the run.
    ///
    /// Only the first verdict is kept.
    pub fn fail(&self, err: BankError) {
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.cancel.cancel();
    }

    /// Take the recorded fatal verdict, if any.
    pub fn take_fatal(&self) -> Option<BankError> {
        self.fatal.lock().take()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(CancelToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_one_way() {
        let state = RunState::default();
        assert!(!state.is_stopped());
        state.stop();
        state.stop();
        assert!(state.is_stopped());
        assert!(!state.is_cancelled());
    }

    #[test]
    fn test_fail_keeps_first_and_cancels() {
        let state = RunState::default();
        state.fail(BankError::Corruption("first".into()));
        state.fail(BankError::Corruption("second".into()));

        assert!(state.is_cancelled());
        match state.take_fatal() {
            Some(BankError::Corruption(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected verdict: {:?}", other),
        }
        assert!(state.take_fatal().is_none());
    }
}
