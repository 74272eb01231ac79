//! Drives one upstream call through bounded retries with exponential
//! backoff, feeding outcomes to a [`CircuitBreaker`]. Streaming requests
//! never go through this executor — their bodies aren't replayable, so only
//! the non-streaming single-call path retries.

use std::future::Future;
use std::time::Duration;

use llmproxy_provider_core::{CircuitBreaker, RetryPolicy};
use tracing::{debug, warn};

use crate::response::{ExecutorResult, SyntheticError, UpstreamResponse};

/// What one attempt of the thunk can fail with, when it never got an
/// upstream response at all.
#[derive(Debug, Clone)]
pub enum AttemptError {
    /// DNS, connection refused, TLS handshake failure.
    Connection(String),
    /// Read/write failure mid-flight after the connection was established.
    Request(String),
}

impl AttemptError {
    fn describe(&self) -> String {
        match self {
            AttemptError::Connection(msg) => format!("connection error: {msg}"),
            AttemptError::Request(msg) => format!("request error: {msg}"),
        }
    }
}

const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Runs `attempt` up to `1 + policy.max_retries` times. `attempt` is called
/// fresh each time (it must be safe to invoke more than once — callers pass
/// a closure that rebuilds the outbound request).
pub async fn execute<F, Fut>(breaker: &CircuitBreaker, policy: &RetryPolicy, mut attempt: F) -> ExecutorResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<UpstreamResponse, AttemptError>>,
{
    let total_attempts = 1 + policy.max_retries;
    let mut last_response: Option<UpstreamResponse> = None;
    let mut last_error: Option<AttemptError> = None;

    for attempt_idx in 0..total_attempts {
        if !breaker.admit() {
            return ExecutorResult::Synthetic(SyntheticError::new(503, "Circuit breaker open. Try later."));
        }

        match attempt().await {
            Ok(response) if response.status == 429 => {
                let wait = retry_after(&response.headers)
                    .unwrap_or_else(|| backoff_duration(policy, attempt_idx));
                last_response = Some(response);
                tokio::time::sleep(wait).await;
            }
            Ok(response) if RETRYABLE_STATUSES.contains(&response.status) => {
                last_response = Some(response);
                if breaker.record_failure() {
                    warn!(attempt = attempt_idx, "circuit breaker opened after retryable upstream failure");
                    return ExecutorResult::Synthetic(SyntheticError::new(
                        503,
                        "Circuit breaker activated. Try later.",
                    ));
                }
                tokio::time::sleep(backoff_duration(policy, attempt_idx)).await;
            }
            Ok(response) => {
                breaker.record_success();
                return ExecutorResult::Upstream(response);
            }
            Err(err) => {
                debug!(attempt = attempt_idx, error = %err.describe(), "upstream attempt failed");
                last_error = Some(err);
                last_response = None;
                if breaker.record_failure() {
                    warn!(attempt = attempt_idx, "circuit breaker opened after transport failure");
                    return ExecutorResult::Synthetic(SyntheticError::new(
                        503,
                        "Circuit breaker activated. Try later.",
                    ));
                }
                tokio::time::sleep(backoff_duration(policy, attempt_idx)).await;
            }
        }
    }

    match last_response {
        Some(response) => ExecutorResult::Upstream(response),
        None => ExecutorResult::Synthetic(SyntheticError {
            status: 523,
            body: serde_json::json!({
                "error": last_error.map(|err| err.describe()).unwrap_or_else(|| "no upstream response received".to_string())
            }),
        }),
    }
}

fn backoff_duration(policy: &RetryPolicy, attempt_idx: u32) -> Duration {
    let jitter: f64 = rand::random::<f64>() * 0.1;
    let base = policy.base_delay_s * policy.backoff_factor.powi(attempt_idx as i32) + jitter;
    Duration::from_secs_f64(base.max(0.0))
}

fn retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    headers
        .get(http::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use llmproxy_provider_core::BreakerPolicy;

    use super::*;

    fn disabled_breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerPolicy { failure_threshold: 0, recovery_s: 30, window_s: 60 })
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, base_delay_s: 0.0, backoff_factor: 1.0 }
    }

    fn response(status: u16) -> UpstreamResponse {
        UpstreamResponse { status, headers: http::HeaderMap::new(), body: Bytes::new() }
    }

    #[tokio::test]
    async fn exhausts_exactly_one_plus_max_retries_attempts() {
        let breaker = disabled_breaker();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();
        let result = execute(&breaker, &policy(2), move || {
            let calls_ref = calls_ref.clone();
            async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(response(500))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.status(), 500);
    }

    #[tokio::test]
    async fn breaker_opening_mid_loop_short_circuits_with_503() {
        let breaker = CircuitBreaker::new(BreakerPolicy { failure_threshold: 1, recovery_s: 30, window_s: 60 });
        let result = execute(&breaker, &policy(5), || async { Ok(response(500)) }).await;
        assert_eq!(result.status(), 503);
    }

    #[tokio::test]
    async fn success_after_failures_clears_and_returns_response() {
        let breaker = disabled_breaker();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();
        let result = execute(&breaker, &policy(5), move || {
            let calls_ref = calls_ref.clone();
            async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Ok(response(500)) } else { Ok(response(200)) }
            }
        })
        .await;
        assert_eq!(result.status(), 200);
    }

    #[tokio::test]
    async fn connection_only_failure_exhaustion_returns_523() {
        let breaker = disabled_breaker();
        let result = execute(&breaker, &policy(1), || async {
            Err(AttemptError::Connection("refused".to_string()))
        })
        .await;
        assert_eq!(result.status(), 523);
    }

    #[tokio::test]
    async fn admission_denied_returns_503_without_invoking_thunk() {
        let breaker = CircuitBreaker::new(BreakerPolicy { failure_threshold: 1, recovery_s: 3600, window_s: 60 });
        assert!(breaker.record_failure());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();
        let result = execute(&breaker, &policy(3), move || {
            let calls_ref = calls_ref.clone();
            async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(response(200))
            }
        })
        .await;
        assert_eq!(result.status(), 503);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
