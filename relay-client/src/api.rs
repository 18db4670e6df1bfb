//! Gateway capabilities consumed by job workers
//!
//! Workers depend on these traits rather than on [`GatewayClient`](crate::GatewayClient)
//! so they can be driven by any transport, and by fakes in tests.

use async_trait::async_trait;
use relay_core::domain::job::{Job, JobKey};
use relay_core::dto::job::ActivateJobsRequest;

use crate::error::Result;

/// Claims batches of jobs from the engine
#[async_trait]
pub trait JobActivator: Send + Sync {
    /// Activates up to `request.max_jobs_to_activate` jobs
    ///
    /// An empty list means no job of that type is currently available.
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>>;
}

/// Job resolution operations available to a job handler
///
/// A handler is expected to call exactly one of these per job.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Completes the job, merging `variables` into the process instance
    async fn complete_job(&self, job_key: JobKey, variables: serde_json::Value) -> Result<()>;

    /// Marks the job as failed, leaving `retries` attempts
    ///
    /// With zero retries left the engine raises an incident.
    async fn fail_job(&self, job_key: JobKey, retries: i32, error_message: &str) -> Result<()>;

    /// Throws a business error that the process can catch by `error_code`
    async fn throw_error(&self, job_key: JobKey, error_code: &str, error_message: &str)
    -> Result<()>;
}
