//! Error taxonomy for the engine.
//!
//! Per-entity API/persistence failures are classified (transient, permanent,
//! quota-rejected) and absorbed into outcomes; checkpoint infrastructure
//! failures escalate and abort the cycle.

use std::fmt;

/// Error from a single fetch or upsert for one entity. Carried until the
/// retry layer classifies it; never aborts the batch or cycle.
#[derive(Debug)]
pub enum ApiError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Server rejected the call for quota reasons (retryable, but the quota
    /// estimate must be corrected toward zero).
    QuotaRejected(u32),
    /// Response body could not be decoded into the stats schema.
    Decode(String),
    /// Persistence upsert failed. `permanent` marks payload/schema faults
    /// that no retry can fix.
    Upsert { message: String, permanent: bool },
    /// A single attempt exceeded its timeout (counted as transient).
    AttemptTimeout,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Curl(e) => write!(f, "{}", e),
            ApiError::Http(code) => write!(f, "HTTP {}", code),
            ApiError::QuotaRejected(code) => write!(f, "quota rejected (HTTP {})", code),
            ApiError::Decode(msg) => write!(f, "decode: {}", msg),
            ApiError::Upsert { message, .. } => write!(f, "upsert: {}", message),
            ApiError::AttemptTimeout => write!(f, "attempt timed out"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Curl(e) => Some(e),
            _ => None,
        }
    }
}

/// Checkpoint or stats store infrastructure failure. Escalated, not absorbed:
/// continuing without durable checkpointing would break resumability.
#[derive(Debug, thiserror::Error)]
#[error("storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);

impl From<sqlx::Error> for StorageUnavailable {
    fn from(e: sqlx::Error) -> Self {
        StorageUnavailable(e.to_string())
    }
}
