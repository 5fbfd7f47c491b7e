//! Transport-level retry and polling helpers
//!
//! Reconcilers never retry on their own. Transports wrap each remote call in
//! [`with_retry`], and long-running operations are awaited with
//! [`wait_until`].

use crate::error::{CloudError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration for provider operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    #[serde(with = "millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries
    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powf(f64::from(attempt));
        // Cap in float seconds; the uncapped product overflows Duration
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}

/// Polling configuration for waiting on asynchronous state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_retries: 60,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 1.5,
        }
    }
}

impl WaitConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powf(f64::from(attempt));
        (delay as u64).min(self.max_delay_ms)
    }
}

/// Run `operation`, retrying only transient failures.
///
/// After the last attempt the transient error is returned unchanged.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == ErrorKind::Transient && attempt + 1 < attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    "{} failed with a transient error (attempt {}/{}), retrying in {:?}: {}",
                    name,
                    attempt + 1,
                    attempts,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll `check` until it reports `true`.
///
/// Errors from the check stop the wait immediately.
pub async fn wait_until<F, Fut>(config: &WaitConfig, what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 0..config.max_retries {
        if check().await? {
            return Ok(());
        }

        if attempt + 1 < config.max_retries {
            let delay_ms = config.delay_for_attempt(attempt);
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Err(CloudError::Timeout(format!(
        "{} did not complete after {} checks",
        what, config.max_retries
    )))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = WaitConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        assert_eq!(config.delay_for_attempt(3), 8000);
        assert_eq!(config.delay_for_attempt(4), 10000); // capped at max

        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_delay_stays_capped_for_long_runs() {
        let config = RetryConfig {
            max_attempts: 100,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        for attempt in 5..config.max_attempts * 10 {
            assert_eq!(config.delay_for_attempt(attempt), Duration::from_secs(30));
        }
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let value = with_retry(&fast(), "GetStage", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CloudError::Transient("throttled".into()))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_surfaces_transient_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = with_retry(&fast(), "GetStage", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CloudError::Transient("throttled".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_conflict() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = with_retry(&fast(), "DeleteStage", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CloudError::Conflict("in use".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let config = WaitConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            multiplier: 1.0,
        };
        let polls = AtomicU32::new(0);
        let counter = &polls;
        let err = wait_until(&config, "plugin activation", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CloudError::Timeout(_)));
        assert_eq!(polls.load(Ordering::SeqCst), 3);

        tokio_test::assert_ok!(wait_until(&config, "instant", || async { Ok(true) }).await);
    }
}
