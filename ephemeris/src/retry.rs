//! Transient-failure retry with bounded exponential backoff.

use config::RetryPolicy;
use eph_core::{EphemerisError, EphemerisResult};
use std::time::Duration;

/// Run `operation` up to `1 + max_retries` times.
///
/// Only [transient](EphemerisError::is_transient) errors are retried;
/// permanent errors and cancellations are returned on first sight. The
/// delay grows by `backoff_multiplier` per failed attempt, capped at
/// `max_backoff`, with optional ±15% jitter.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> EphemerisResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = EphemerisResult<T>>,
{
    let mut backoff = policy.initial_backoff();
    let mut last_error: Option<EphemerisError> = None;

    for attempt in 0..=policy.max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_transient() || attempt == policy.max_retries {
                    return Err(err);
                }

                let mut delay = backoff;
                if policy.jitter {
                    let jitter = rand::random::<f32>() * 0.3 + 0.85;
                    delay = Duration::from_millis((delay.as_millis() as f32 * jitter) as u64);
                }

                tracing::debug!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;

                backoff = Duration::from_millis(
                    (backoff.as_millis() as f32 * policy.backoff_multiplier) as u64,
                )
                .min(policy.max_backoff());
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| EphemerisError::CalculationFailed {
        reason: "operation failed after retries".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let counter = AtomicUsize::new(0);

        let result = with_retry(&fast_policy(), || async {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                Err(EphemerisError::ProviderUnavailable {
                    reason: "warming up".to_string(),
                })
            } else {
                Ok("success")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);

        let result: EphemerisResult<&str> = with_retry(&fast_policy(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EphemerisError::DataOutOfRange {
                jd: 0.0,
                start_jd: 1.0,
                end_jd: 2.0,
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let counter = AtomicUsize::new(0);

        let result: EphemerisResult<&str> = with_retry(&fast_policy(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EphemerisError::Cancelled {
                reason: "caller gave up".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(EphemerisError::Cancelled { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let counter = AtomicUsize::new(0);

        let result: EphemerisResult<&str> = with_retry(&fast_policy(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EphemerisError::RequestTimeout { timeout_ms: 10 })
        })
        .await;

        assert!(matches!(
            result,
            Err(EphemerisError::RequestTimeout { .. })
        ));
        // 1 initial attempt + 3 retries.
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let counter = AtomicUsize::new(0);
        let policy = RetryPolicy {
            max_retries: 0,
            ..fast_policy()
        };

        let result: EphemerisResult<&str> = with_retry(&policy, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EphemerisError::ProviderUnavailable {
                reason: "offline".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
