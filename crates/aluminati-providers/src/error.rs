//! Provider and gateway error types.

use std::time::Duration;

use thiserror::Error;

/// A single failed call to a model backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited (HTTP {status}), retry after {retry_after_ms}ms")]
    RateLimited { status: u16, retry_after_ms: u64 },

    #[error("server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("bad request (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

impl ProviderError {
    /// Only timeouts, network failures, 408/429 and 5xx are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::RateLimited { .. } | Self::ServerError { .. }
        )
    }

    /// Minimum delay the backend asked for before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(Duration::from_millis(*retry_after_ms)),
            _ => None,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => Self::RateLimited {
                status,
                retry_after_ms: retry_after_secs.unwrap_or(1).saturating_mul(1000),
            },
            408 => Self::Timeout,
            401 | 403 => Self::Auth {
                status,
                message: body,
            },
            500..=599 => Self::ServerError {
                status,
                message: body,
            },
            _ => Self::BadRequest {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Failure of the model gateway as a whole. The agent loop treats this as
/// unrecoverable.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model backend failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },

    #[error("model backend rejected the request: {0}")]
    Fatal(ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, String::new(), Some(3)),
            ProviderError::RateLimited { retry_after_ms: 3000, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(503, "overloaded".into(), None),
            ProviderError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(401, String::new(), None),
            ProviderError::Auth { .. }
        ));
        assert!(matches!(
            ProviderError::from_status(400, String::new(), None),
            ProviderError::BadRequest { .. }
        ));
        assert!(matches!(
            ProviderError::from_status(408, String::new(), None),
            ProviderError::Timeout
        ));
    }

    #[test]
    fn test_huge_retry_after_saturates() {
        let err = ProviderError::from_status(429, String::new(), Some(u64::MAX / 10));
        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after_ms: u64::MAX, .. }
        ));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(u64::MAX)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(
            ProviderError::ServerError { status: 502, message: String::new() }.is_transient()
        );
        assert!(
            !ProviderError::BadRequest { status: 400, message: String::new() }.is_transient()
        );
        assert!(!ProviderError::Auth { status: 401, message: String::new() }.is_transient());
        assert!(!ProviderError::InvalidResponse("x".into()).is_transient());
    }
}
