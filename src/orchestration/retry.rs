//! Bounded retry of whole transactions on SQLite lock conflicts.

use super::FulfillmentError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` until it succeeds, fails with a non-conflict error, or
/// `max_elapsed` has passed since the first attempt.
///
/// `op` must build a fresh transaction on every call. Business errors are
/// permanent and returned immediately.
pub async fn run_with_retry<T, F, Fut>(
    operation: &'static str,
    max_elapsed: Duration,
    mut op: F,
) -> Result<T, FulfillmentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FulfillmentError>>,
{
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(250),
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    retry(backoff, || {
        let attempt = op();
        async move {
            attempt.await.map_err(|e| {
                if e.is_lock_conflict() {
                    warn!(operation, error = %e, "Lock conflict, retrying transaction");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool_timeout() -> FulfillmentError {
        FulfillmentError::Storage(sqlx::Error::PoolTimedOut)
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = run_with_retry("test", Duration::from_millis(200), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FulfillmentError::Validation("bad".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(FulfillmentError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_conflict_storage_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = run_with_retry("test", Duration::from_millis(200), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(pool_timeout()) }
        })
        .await;
        assert!(matches!(result, Err(FulfillmentError::Storage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = run_with_retry("test", Duration::from_millis(200), || async {
            Ok::<_, FulfillmentError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
