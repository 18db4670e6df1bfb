//! Error types for the Relay client

use std::time::Duration;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the gateway
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Gateway returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the gateway
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The request was rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The call, retries included, did not finish in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if repeating the same call may succeed
    ///
    /// Covers back-pressure (429), gateway unavailability (502, 503, 504)
    /// and connection level failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ApiError { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::RequestFailed(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let not_found = ClientError::api_error(404, "no such job");
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        let unavailable = ClientError::api_error(503, "leader change");
        assert!(unavailable.is_transient());

        assert!(ClientError::api_error(429, "exhausted").is_transient());
        assert!(!ClientError::api_error(500, "bug").is_transient());
    }

    #[test]
    fn test_local_errors_are_not_transient() {
        assert!(!ClientError::ParseError("bad".into()).is_transient());
        assert!(!ClientError::InvalidRequest("bad".into()).is_transient());
        assert!(!ClientError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn test_display() {
        let err = ClientError::api_error(503, "unavailable");
        assert_eq!(err.to_string(), "API error (status 503): unavailable");
    }
}
