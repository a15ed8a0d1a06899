//! Timeout and retry policy for calls that leave the process (store and
//! provider). Each attempt is bounded; a retryable failure gets exactly one
//! more attempt after a fixed backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            backoff: Duration::from_millis(500),
            max_attempts: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, backoff: Duration) -> Self {
        Self {
            timeout,
            backoff,
            ..Self::default()
        }
    }

    /// Run `call` under the policy. `call` is invoked once per attempt.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::UpstreamTimeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        "{operation} failed (attempt {attempt}/{attempts}): {e}; retrying in {:?}",
                        self.backoff
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let v = fast_policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(3)
            })
            .await
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_once_then_succeeds() {
        let calls = AtomicU32::new(0);
        let v = fast_policy()
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EngineError::provider("503"))
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();
        assert_eq!(v, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_two_attempts() {
        let calls = AtomicU32::new(0);
        let err = fast_policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::provider("quota"))
            })
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::provider("quota"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let err = fast_policy()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::invalid("bad"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_after_retry() {
        let calls = AtomicU32::new(0);
        let err = fast_policy()
            .run("embed", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::UpstreamTimeout {
                operation: "embed".to_string(),
                timeout_ms: 50
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
