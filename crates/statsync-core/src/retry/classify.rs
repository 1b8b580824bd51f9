//! Classify HTTP status, curl, and store errors into retry policy error kinds.

use crate::error::ApiError;
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
///
/// 4xx codes are permanent (bad id, auth) except 408 (request timeout) and
/// 429 (throttling), which are worth retrying.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 | 429 => ErrorKind::Http5xx(code as u16),
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Permanent,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Permanent
}

/// Classify a per-entity error into an ErrorKind.
pub fn classify(e: &ApiError) -> ErrorKind {
    match e {
        ApiError::Curl(ce) => classify_curl_error(ce),
        ApiError::Http(code) => classify_http_status(*code),
        ApiError::QuotaRejected(_) => ErrorKind::QuotaRejected,
        ApiError::Decode(_) => ErrorKind::Permanent,
        ApiError::Upsert { permanent, .. } => {
            if *permanent {
                ErrorKind::Permanent
            } else {
                ErrorKind::Connection
            }
        }
        ApiError::AttemptTimeout => ErrorKind::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_408_and_429_retryable() {
        assert!(classify_http_status(408).is_transient());
        assert!(classify_http_status(429).is_transient());
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(503), ErrorKind::Http5xx(503)));
    }

    #[test]
    fn http_4xx_permanent() {
        assert_eq!(classify_http_status(404), ErrorKind::Permanent);
        assert_eq!(classify_http_status(401), ErrorKind::Permanent);
        assert_eq!(classify_http_status(400), ErrorKind::Permanent);
    }

    #[test]
    fn quota_rejection_has_its_own_kind() {
        assert_eq!(
            classify(&ApiError::QuotaRejected(403)),
            ErrorKind::QuotaRejected
        );
        assert!(ErrorKind::QuotaRejected.is_transient());
    }

    #[test]
    fn decode_errors_permanent() {
        assert_eq!(
            classify(&ApiError::Decode("bad json".into())),
            ErrorKind::Permanent
        );
    }

    #[test]
    fn upsert_errors_follow_flag() {
        assert!(classify(&ApiError::Upsert {
            message: "connection reset".into(),
            permanent: false,
        })
        .is_transient());
        assert_eq!(
            classify(&ApiError::Upsert {
                message: "constraint violation".into(),
                permanent: true,
            }),
            ErrorKind::Permanent
        );
    }

    #[test]
    fn attempt_timeout_transient() {
        assert_eq!(classify(&ApiError::AttemptTimeout), ErrorKind::Timeout);
    }
}
