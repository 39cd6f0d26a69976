//! Cooperative cancellation shared by every task in a run.
//!
//! Cancelling drops the token's only sender, which disconnects the
//! `done()` receiver. Any `crossbeam_channel::select!` that includes
//! `recv(token.done())` wakes immediately, so waits on work queues,
//! tickers and timeouts all race against the same signal.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CancelInner {
    cancelled: AtomicBool,
    sender: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

/// Clonable handle to the run's cancellation signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create a live token.
    pub fn new() -> Self {
        let (sender, done) = bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                sender: Mutex::new(Some(sender)),
                done,
            }),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.sender.lock().take();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once cancelled.
    ///
    /// Never carries a message; use it only inside `select!`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` on cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        select! {
            recv(self.done()) -> _ => false,
            default(duration) => true,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
