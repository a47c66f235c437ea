//! Classification of transient submission failures and backoff timing.

use crate::error::SubmissionError;
use std::time::Duration;

/// Longest wait between two attempts.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Whether a failed submission is worth sending again.
///
/// Retryable: timeouts, connection failures, rate limits (429) and server
/// errors (5xx). Client errors and encoding failures are final.
pub fn is_retryable(error: &SubmissionError) -> bool {
    match error {
        SubmissionError::Timeout { .. } | SubmissionError::Connect { .. } => true,
        SubmissionError::Http {
            status_code: Some(code),
            ..
        } => *code == 429 || (500..=599).contains(code),
        SubmissionError::Http {
            status_code: None, ..
        } => false,
        SubmissionError::Encode(_) => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status_code: Option<u16>, message: &str) -> SubmissionError {
        SubmissionError::Http {
            url: "http://localhost/results/".to_string(),
            message: message.to_string(),
            status_code,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = SubmissionError::Timeout {
            url: "http://localhost/results/".to_string(),
            timeout_ms: 30_000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable(&http(Some(429), "HTTP 429: slow down")));
        assert!(is_retryable(&http(Some(503), "HTTP 503: unavailable")));
        assert!(!is_retryable(&http(Some(400), "HTTP 400: bad group name")));
        assert!(!is_retryable(&http(Some(404), "HTTP 404")));
    }

    #[test]
    fn test_connect_errors_are_retryable() {
        let err = SubmissionError::Connect {
            url: "http://localhost/results/".to_string(),
            message: "error sending request for url (http://localhost/results/)".to_string(),
        };
        assert!(is_retryable(&err));
        assert!(!is_retryable(&http(None, "error decoding response body")));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
        assert_eq!(backoff_duration(u32::MAX, 1000), Duration::from_millis(30_000));
    }
}
