use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::RetryConfig;
use crate::error::{ConciergeError, Result};

/// Retry policy for calls to the generation API
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// Single attempt; the chat and comparison paths fall back instead of retrying
    #[default]
    Never,
    /// Exponential backoff with jitter, retrying transient failures only
    ExponentialBackoff(RetryConfig),
}

impl RetryPolicy {
    /// Delays between attempts, before jitter
    fn backoff(cfg: &RetryConfig) -> impl Iterator<Item = Duration> {
        let factor = (cfg.initial_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(cfg.max_delay())
            .take(cfg.max_attempts.saturating_sub(1) as usize)
    }

    pub async fn run<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut op = op;
        match self {
            RetryPolicy::Never => op().await,
            RetryPolicy::ExponentialBackoff(cfg) => {
                let strategy = Self::backoff(cfg).map(|delay| {
                    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
                    delay.mul_f64(jitter)
                });
                RetryIf::spawn(strategy, op, |e: &ConciergeError| {
                    let retry = e.is_retryable();
                    if retry {
                        tracing::warn!("Retrying generation call after transient error: {}", e);
                    }
                    retry
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::ExponentialBackoff(RetryConfig {
            max_attempts,
            initial_delay_ms: 2,
            max_delay_ms: 4,
        })
    }

    fn unavailable() -> ConciergeError {
        ConciergeError::Api {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let cfg = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        };
        let delays: Vec<Duration> = RetryPolicy::backoff(&cfg).collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn never_makes_a_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = RetryPolicy::Never
            .run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(unavailable()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exponential_retries_transient_errors_up_to_the_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = fast(3)
            .run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(unavailable()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exponential_stops_on_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast(3)
            .run(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(unavailable())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = fast(3)
            .run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ConciergeError::Disabled) }
            })
            .await;
        assert!(matches!(result, Err(ConciergeError::Disabled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
