use std::future::Future;

use crate::error::ApiError;
use crate::retry::classify::classify;
use crate::retry::policy::{RetryDecision, RetryPolicy};

/// Terminal failure from the retry loop: the last error plus how many
/// attempts were made. Feeds directly into a `Failure` outcome.
#[derive(Debug)]
pub struct RetryError {
    pub last: ApiError,
    pub attempts: u32,
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {} attempts)", self.last, self.attempts)
    }
}

impl std::error::Error for RetryError {}

/// Runs an async unit of work until it succeeds or the retry policy says to
/// stop. Each attempt is bounded by `policy.attempt_timeout`; exceeding it
/// counts as a transient failure. On retryable failure, sleeps for the
/// backoff duration then tries again.
///
/// Returns the value and the number of attempts used (1-based).
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut f: F,
) -> Result<(T, u32), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1u32;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, f()).await {
            Ok(r) => r,
            Err(_) => Err(ApiError::AttemptTimeout),
        };
        match result {
            Ok(v) => return Ok((v, attempt)),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryError {
                            last: e,
                            attempts: attempt,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(
                            attempt,
                            delay_ms = d.as_millis() as u64,
                            error = %e,
                            "transient failure, backing off"
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
