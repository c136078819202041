//! Retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use engram_core::constants::RETRY_BACKOFF_MS;
use engram_core::errors::EmbeddingError;
use tracing::warn;

/// Retry policy: up to three attempts, 1s/2s/4s between them, and a
/// `Retry-After` hint (when the provider sent one) wins over the
/// schedule when it is longer.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    schedule_ms: [u64; 3],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            schedule_ms: RETRY_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Schedule override for tests.
    pub fn with_schedule(schedule_ms: [u64; 3]) -> Self {
        Self { schedule_ms }
    }

    /// Run `op` until it succeeds, a non-retryable error appears, or the
    /// schedule is exhausted. Returns the last error in the failure case.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EmbeddingError>>,
    {
        let mut last_err = None;
        for (attempt, &base_ms) in self.schedule_ms.iter().enumerate() {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() => {
                    let wait_ms = match &e {
                        EmbeddingError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => (*ms).max(base_ms),
                        _ => base_ms,
                    };
                    warn!(
                        label,
                        attempt = attempt + 1,
                        wait_ms,
                        error = %e,
                        "provider call failed, backing off"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
        // One final attempt after the last sleep.
        match op().await {
            Ok(v) => Ok(v),
            Err(e) => Err(last_err.map_or(e.clone(), |prev| match e {
                // Keep the most recent error unless it is less specific.
                EmbeddingError::ProviderUnavailable { .. } => prev,
                other => other,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_first_try() {
        let policy = RetryPolicy::with_schedule([0, 0, 0]);
        let out = policy.run("t", || async { Ok::<_, EmbeddingError>(42) }).await;
        assert_eq!(out.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let policy = RetryPolicy::with_schedule([0, 0, 0]);
        let calls = AtomicU32::new(0);
        let out = policy
            .run("t", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(EmbeddingError::Http {
                            status: 503,
                            message: "unavailable".into(),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_four_attempts() {
        let policy = RetryPolicy::with_schedule([0, 0, 0]);
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = policy
            .run("t", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(EmbeddingError::RateLimited {
                        retry_after_ms: Some(0),
                    })
                }
            })
            .await;
        assert!(out.is_err());
        // Three scheduled retries plus the final attempt.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_fails_fast() {
        let policy = RetryPolicy::with_schedule([0, 0, 0]);
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = policy
            .run("t", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(EmbeddingError::InvalidResponse {
                        reason: "no data".into(),
                    })
                }
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
