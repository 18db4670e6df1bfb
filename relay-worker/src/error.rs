//! Error types for the job worker

use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Errors raised while configuring or opening a job worker
///
/// Once a worker is open it never fails on its own: gateway errors are
/// logged by the poller and handler outcomes belong to the handler.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The job type to activate was empty
    #[error("job type must not be empty")]
    EmptyJobType,

    /// A configuration value could not be read
    #[error("invalid worker configuration: {0}")]
    Config(String),
}
