//! Job DTOs for gateway communication

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Lease duration requested when the worker does not configure one
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Worker name reported to the engine when none is configured
pub const DEFAULT_JOB_WORKER_NAME: &str = "default";

/// Request to activate a batch of jobs of one type
///
/// The worker keeps one of these as a template and only changes
/// `max_jobs_to_activate` between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateJobsRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub worker: String,
    /// Lease duration in milliseconds
    pub timeout: i64,
    pub max_jobs_to_activate: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_variable: Vec<String>,
    /// Long polling timeout in milliseconds, zero lets the gateway decide
    #[serde(default)]
    pub request_timeout: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tenant_ids: Vec<String>,
}

impl ActivateJobsRequest {
    /// Creates a request for `job_type` with default worker name and lease
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            worker: DEFAULT_JOB_WORKER_NAME.to_string(),
            timeout: duration_millis(DEFAULT_JOB_TIMEOUT),
            max_jobs_to_activate: 0,
            fetch_variable: Vec::new(),
            request_timeout: 0,
            tenant_ids: Vec::new(),
        }
    }

    /// Copy of this request asking for at most `amount` jobs
    pub fn with_max_jobs(&self, amount: usize) -> Self {
        Self {
            max_jobs_to_activate: i32::try_from(amount).unwrap_or(i32::MAX),
            ..self.clone()
        }
    }
}

/// Jobs handed out by the gateway for an activation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivateJobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Body of a job completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteJobRequest {
    pub variables: serde_json::Value,
}

/// Body of a job failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailJobRequest {
    pub retries: i32,
    #[serde(default)]
    pub error_message: String,
    /// Delay in milliseconds before the job may be activated again
    #[serde(default)]
    pub retry_back_off: i64,
}

/// Body of a business error thrown from a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowErrorRequest {
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

/// Body of a retries update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobRetriesRequest {
    pub retries: i32,
}

/// Converts a duration to whole milliseconds, saturating at `i64::MAX`
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
