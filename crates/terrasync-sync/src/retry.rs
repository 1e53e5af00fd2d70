//! Bounded retry with exponential backoff
//!
//! Only the orchestrator retries; adapters report every failure exactly
//! once with a typed [`SyncError`] root cause. An error is retried only
//! when that cause classifies itself as transient.
//!
//! Backoff schedule with the default settings: 1s, 2s, 4s, 8s, 16s.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use terrasync_core::domain::errors::SyncError;

/// Retry knobs, taken from `TransferConfig`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Whether the typed root cause marks this error as retryable
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_transient)
}

/// Executes an async operation, retrying transient failures with backoff
///
/// Non-transient errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    f: F,
) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt < policy.max_retries && is_transient(&err) {
                    let delay = policy.base_delay * 2u32.pow(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(err);
                } else {
                    return Err(err);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("retry budget exhausted for {operation_name}")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", fast_policy(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", fast_policy(5), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(anyhow::Error::new(SyncError::NetworkFailure {
                    message: "connection reset".into(),
                }))
            } else {
                Ok("ok")
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry("op", fast_policy(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::Error::new(SyncError::PermissionDenied {
                project: "survey/rivers".into(),
            }))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry("op", fast_policy(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::Error::new(SyncError::NetworkFailure {
                message: "timeout".into(),
            }))
        })
        .await;
        assert!(result.is_err());
        // initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
