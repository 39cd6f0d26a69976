//! Bounded retry with fixed backoff.

use bankcheck_core::{BankError, BankResult, CancelToken, StoreResult};
use std::time::Duration;
use tracing::debug;

/// Run `op` until it succeeds, `limit` attempts fail, or `cancel` fires.
///
/// A negative `limit` retries forever. Only transient store failures are
/// retried; anything else is returned as is. Cancellation during a
/// backoff wait returns `Ok(())`: the caller observes the token itself.
///
/// # Errors
///
/// `BankError::RetryExhausted` wrapping the last failure once `limit`
/// attempts have failed, the first non-transient failure, or
/// `BankError::InvalidConfig` for a `limit` of zero.
pub fn run_with_retry<F>(
    cancel: &CancelToken,
    limit: i64,
    interval: Duration,
    mut op: F,
) -> BankResult<()>
where
    F: FnMut() -> BankResult<()>,
{
    if limit == 0 {
        return Err(BankError::InvalidConfig(
            "retry limit must be non-zero".to_string(),
        ));
    }

    let mut attempts = 0usize;
    loop {
        let err = match op() {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        attempts += 1;

        if !err.is_transient() {
            return Err(err);
        }

        if limit >= 0 && attempts as i64 >= limit {
            return Err(BankError::RetryExhausted {
                attempts,
                source: Box::new(err),
            });
        }

        debug!(target: "bank::retry", attempt = attempts, error = %err, "Retrying after failure");
        if !cancel.sleep(interval) {
            return Ok(());
        }
    }
}

/// Treat a duplicate-key failure as success.
///
/// Seeding inserts race against rows left by a partial earlier run, so an
/// existing key means the row is already there.
pub fn absorb_duplicate<T: Default>(result: StoreResult<T>) -> StoreResult<T> {
    match result {
        Err(e) if e.is_duplicate_key() => Ok(T::default()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankcheck_core::StoreError;
    use std::thread;
    use std::time::Instant;

    fn busy() -> BankError {
        StoreError::Busy("lock wait timeout".into()).into()
    }

    #[test]
    fn test_success_returns_immediately() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        run_with_retry(&cancel, 5, Duration::from_secs(10), || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_bounded_retry_makes_exactly_limit_attempts() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let err = run_with_retry(&cancel, 3, Duration::from_millis(1), || {
            calls += 1;
            Err(busy())
        })
        .unwrap_err();

        assert_eq!(calls, 3);
        match err {
            BankError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, BankError::Store(StoreError::Busy(_))));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_zero_limit_makes_no_attempt() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let err = run_with_retry(&cancel, 0, Duration::from_millis(1), || {
            calls += 1;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(calls, 0);
        assert!(matches!(err, BankError::InvalidConfig(_)), "got {:?}", err);
    }

    #[test]
    fn test_non_transient_failure_is_not_retried() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let err = run_with_retry(&cancel, 200, Duration::from_secs(5), || {
            calls += 1;
            Err(StoreError::Statement("near \"VALUES\": syntax error".into()).into())
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, BankError::Store(StoreError::Statement(_))), "got {:?}", err);
    }

    #[test]
    fn test_negative_limit_retries_until_success() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        run_with_retry(&cancel, -1, Duration::from_millis(1), || {
            calls += 1;
            if calls < 50 {
                Err(busy())
            } else {
                Ok(())
            }
        })
        .unwrap();
        assert_eq!(calls, 50);
    }

    #[test]
    fn test_cancellation_during_backoff_is_success() {
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let start = Instant::now();
        let result = run_with_retry(&cancel, -1, Duration::from_secs(60), || Err(busy()));
        handle.join().unwrap();

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_duplicate_key_does_not_consume_attempts() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        run_with_retry(&cancel, 1, Duration::from_millis(1), || {
            calls += 1;
            absorb_duplicate::<u64>(Err(StoreError::DuplicateKey("PRIMARY".into())))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_absorb_duplicate_passes_other_errors() {
        let result = absorb_duplicate::<u64>(Err(StoreError::Busy("x".into())));
        assert!(matches!(result, Err(StoreError::Busy(_))));
        assert_eq!(absorb_duplicate(Ok(7u64)).unwrap(), 7);
    }
}
