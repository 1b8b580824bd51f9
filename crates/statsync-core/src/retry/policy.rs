use std::time::Duration;

/// High-level classification of a per-entity error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read, or the per-attempt watchdog).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable (5xx, 408, 429).
    Http5xx(u16),
    /// Server rejected the call for quota reasons. Retried like a transient
    /// error; the caller additionally corrects the quota estimate.
    QuotaRejected,
    /// Certain to recur: bad identifier, auth failure, malformed payload.
    Permanent,
}

impl ErrorKind {
    /// True for kinds that may succeed on retry.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps, plus the per-attempt timeout.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
    /// Upper bound on a single attempt's wall-clock time.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &crate::config::RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay(),
            max_delay: cfg.max_delay(),
            attempt_timeout: cfg.attempt_timeout(),
        }
    }

    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        if !kind.is_transient() {
            return RetryDecision::NoRetry;
        }

        // Exponential backoff: base * 2^(attempt-1), capped.
        let exp = 1u32.saturating_mul(1 << attempt.saturating_sub(1).min(8));
        let raw = self.base_delay.saturating_mul(exp);
        let delay = raw.min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}
