//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, quota rejections,
//! connection failures) and exponential backoff decisions so that the
//! scheduler's workers share a consistent policy. The `decide` function is
//! pure; the async loop in `run` owns the sleeps and attempt counting.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryError};
