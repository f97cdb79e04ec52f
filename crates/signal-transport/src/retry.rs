//! Bounded retry with exponential backoff
//!
//! Signaling sends must never crash a call silently: transient relay
//! failures are retried with jittered exponential backoff, and only
//! exhaustion (or a non-recoverable error) surfaces to the orchestrator.

use crate::error::{TransportError, TransportResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries; useful in tests
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Run `operation` with bounded exponential backoff.
///
/// Retries only errors whose [`TransportError::is_recoverable`] is true.
/// When the attempt budget is exhausted on a recoverable error, the error is
/// reported as [`TransportError::SignalingUnavailable`] so callers can tell
/// "the relay is down" apart from "the relay said no".
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> TransportResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_recoverable() && attempt < config.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    category = e.category(),
                    next_delay_ms = delay.as_millis(),
                    "Recoverable error, will retry"
                );

                let actual_delay = if config.use_jitter {
                    let jitter = (rand::random::<f64>() - 0.5) * 0.2;
                    let millis = delay.as_millis() as f64;
                    Duration::from_millis((millis * (1.0 + jitter)) as u64)
                } else {
                    delay
                };
                sleep(actual_delay).await;

                let next_delay_ms = (delay.as_millis() as f64 * config.backoff_multiplier) as u64;
                delay = Duration::from_millis(next_delay_ms).min(config.max_delay);
            }
            Err(e) if e.is_recoverable() => {
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %e,
                    "Operation failed after all retry attempts"
                );
                return Err(TransportError::SignalingUnavailable {
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                error!(
                    operation = operation_name,
                    error = %e,
                    category = e.category(),
                    "Non-recoverable error, not retrying"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            use_jitter: false,
        }
    }

    #[tokio::test]
    async fn recoverable_errors_are_retried_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff("test_op", &fast(), || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TransportError::network("connection refused"))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn exhaustion_becomes_signaling_unavailable() {
        let result: TransportResult<()> =
            retry_with_backoff("test_op", &fast(), || async {
                Err(TransportError::network("connection refused"))
            })
            .await;
        match result.unwrap_err() {
            TransportError::SignalingUnavailable { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected SignalingUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_recoverable_errors_fail_immediately() {
        let attempts = AtomicU32::new(0);
        let result: TransportResult<()> =
            retry_with_backoff("test_op", &RetryConfig::default(), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::SessionExpired {
                    session_id: "visit-1".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(TransportError::SessionExpired { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
