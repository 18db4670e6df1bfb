//! Configuration module
//!
//! Handles CLI configuration: where the gateway lives and how long a call
//! may take.

use std::time::Duration;

use relay_client::{GatewayClient, RetryPredicate};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the gateway
    pub address: String,

    /// Per-call timeout, the client default when unset
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn new(address: String, request_timeout_ms: Option<u64>) -> Self {
        Self {
            address,
            request_timeout: request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Builds a gateway client that retries transient failures
    pub fn client(&self) -> GatewayClient {
        let client =
            GatewayClient::new(&self.address).with_retry_predicate(RetryPredicate::transient());

        match self.request_timeout {
            Some(timeout) => client.with_request_timeout(timeout),
            None => client,
        }
    }
}
