//! Linear backoff for bucket rate limiting.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::AcquisitionError;

/// Retries SlowDown failures with delays of `step`, `2 * step`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowDownRetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub step: Duration,
}

impl SlowDownRetryPolicy {
    pub fn new(max_retries: u32, step_secs: u64) -> Self {
        Self {
            max_retries,
            step: Duration::from_secs(step_secs),
        }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.step * (retry + 1)
    }

    pub fn should_retry(&self, error: &AcquisitionError, retry: u32) -> bool {
        error.is_transient() && retry < self.max_retries
    }
}

impl Default for SlowDownRetryPolicy {
    fn default() -> Self {
        Self::new(4, 60)
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// the policy runs out of retries.
pub async fn retry_on_slow_down<T, F, Fut>(
    policy: &SlowDownRetryPolicy,
    mut operation: F,
) -> Result<T, AcquisitionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AcquisitionError>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    info!("Download successful after {} retries.", retry);
                }
                return Ok(value);
            }
            Err(e) if policy.should_retry(&e, retry) => {
                let delay = policy.delay(retry);
                warn!(
                    "Retrying download in {} seconds... ({}/{})",
                    delay.as_secs(),
                    retry + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(AcquisitionError::RetriesExhausted {
                    attempts: retry + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> SlowDownRetryPolicy {
        SlowDownRetryPolicy {
            max_retries,
            step: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_default_delays() {
        let policy = SlowDownRetryPolicy::default();
        assert_eq!(policy.max_retries, 4);
        let delays: Vec<u64> = (0..4).map(|i| policy.delay(i).as_secs()).collect();
        assert_eq!(delays, vec![60, 120, 180, 240]);
    }

    #[test]
    fn test_should_retry() {
        let policy = SlowDownRetryPolicy::default();
        let slow = AcquisitionError::SlowDown("busy".to_string());
        assert!(policy.should_retry(&slow, 0));
        assert!(policy.should_retry(&slow, 3));
        assert!(!policy.should_retry(&slow, 4));

        let fatal = AcquisitionError::Spawn {
            program: "aws".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!policy.should_retry(&fatal, 0));
    }

    #[tokio::test]
    async fn test_recovers_after_slow_down() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = retry_on_slow_down(&fast_policy(4), move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AcquisitionError::SlowDown("busy".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), _> = retry_on_slow_down(&fast_policy(4), move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AcquisitionError::SlowDown("busy".to_string()))
        })
        .await;

        assert!(matches!(
            result,
            Err(AcquisitionError::RetriesExhausted { attempts: 5, .. })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), _> = retry_on_slow_down(&fast_policy(4), move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AcquisitionError::Spawn {
                program: "aws".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        })
        .await;

        assert!(matches!(result, Err(AcquisitionError::Spawn { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
