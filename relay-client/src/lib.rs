//! Relay HTTP Client
//!
//! A small, type-safe HTTP client for the workflow engine gateway.
//!
//! The client exposes the job operations a worker needs: activating jobs
//! and resolving them again (complete, fail, throw a business error). Job
//! workers consume it through the [`JobActivator`] and [`JobClient`] traits.
//!
//! # Example
//!
//! ```no_run
//! use relay_client::GatewayClient;
//! use relay_core::dto::job::ActivateJobsRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_client::ClientError> {
//!     let client = GatewayClient::new("http://localhost:8080");
//!
//!     let jobs = client
//!         .activate_jobs(&ActivateJobsRequest::new("payment").with_max_jobs(5))
//!         .await?;
//!
//!     for job in jobs {
//!         client.complete_job(job.key, serde_json::json!({})).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
mod jobs;
pub mod retry;

// Re-export commonly used types
pub use api::{JobActivator, JobClient};
pub use error::{ClientError, Result};
pub use retry::RetryPredicate;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Timeout applied to every gateway call unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time granted to activation calls on top of their long polling timeout
pub const REQUEST_TIMEOUT_OFFSET: Duration = Duration::from_secs(10);

/// HTTP client for the workflow engine gateway
///
/// Every call is bounded by the request timeout. Failed calls are sent
/// again for as long as the [`RetryPredicate`] allows and the timeout has
/// not run out.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    /// Base URL of the gateway (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Upper bound for a single call, retries included
    request_timeout: Duration,
    /// Shared retry policy
    retry: RetryPredicate,
}

impl GatewayClient {
    /// Create a new gateway client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the gateway API (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use relay_client::GatewayClient;
    ///
    /// let client = GatewayClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new gateway client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the gateway API
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPredicate::default(),
        }
    }

    /// Replace the per-call timeout
    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }

    /// Replace the retry policy
    pub fn with_retry_predicate(self, retry: RetryPredicate) -> Self {
        Self { retry, ..self }
    }

    /// Get the base URL of the gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-call timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Get the retry policy shared with workers built on this client
    pub fn retry_predicate(&self) -> &RetryPredicate {
        &self.retry
    }

    // =============================================================================
    // Retry Loop
    // =============================================================================

    /// Runs `call` until it succeeds, the predicate refuses a retry, or
    /// `timeout` elapses
    async fn send_with_retry<T, F, Fut>(&self, timeout: Duration, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = async {
            loop {
                match call().await {
                    Ok(value) => return Ok(value),
                    Err(err) if self.retry.should_retry(&err) => {
                        debug!(error = %err, "Retrying gateway call");
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        tokio::time::timeout(timeout, attempts)
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_client_creation() {
        let client = GatewayClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = GatewayClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = GatewayClient::with_client("http://localhost:8080", http_client)
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.request_timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_send_with_retry_repeats_retryable_errors() {
        let client = GatewayClient::new("http://localhost:8080")
            .with_retry_predicate(RetryPredicate::transient());
        let calls = Arc::new(AtomicUsize::new(0));

        let result = client
            .send_with_retry(Duration::from_secs(5), || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(ClientError::api_error(503, "unavailable"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_send_with_retry_stops_on_terminal_error() {
        let client = GatewayClient::new("http://localhost:8080")
            .with_retry_predicate(RetryPredicate::transient());
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<()> = client
            .send_with_retry(Duration::from_secs(5), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ClientError::api_error(404, "no such job"))
                }
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_with_retry_is_bounded_by_timeout() {
        let client = GatewayClient::new("http://localhost:8080")
            .with_retry_predicate(RetryPredicate::from_fn(|_| true));

        let result: Result<()> = client
            .send_with_retry(Duration::from_millis(50), || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(ClientError::api_error(503, "unavailable"))
            })
            .await;

        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }
}
