//! In-memory gateway used by the worker tests

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use async_trait::async_trait;
use relay_client::{ClientError, JobActivator, JobClient, Result};
use relay_core::domain::job::{Job, JobKey};
use relay_core::dto::job::ActivateJobsRequest;

/// How a handler resolved a job
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Completed(JobKey, serde_json::Value),
    Failed(JobKey, i32, String),
    Thrown(JobKey, String, String),
}

/// Scripted gateway
///
/// Activation answers come from a queue of scripted responses; once the
/// queue is empty every activation returns no jobs. All requests and
/// resolutions are recorded.
#[derive(Default)]
pub struct FakeGateway {
    responses: Mutex<VecDeque<Result<Vec<Job>>>>,
    requests: Mutex<Vec<ActivateJobsRequest>>,
    resolutions: Mutex<Vec<Resolution>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_jobs(&self, jobs: Vec<Job>) {
        self.responses.lock().unwrap().push_back(Ok(jobs));
    }

    pub fn push_error(&self, error: ClientError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ActivateJobsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_batch_sizes(&self) -> Vec<i32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.max_jobs_to_activate)
            .collect()
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        self.resolutions.lock().unwrap().clone()
    }

    fn resolve(&self, resolution: Resolution) -> Result<()> {
        self.resolutions.lock().unwrap().push(resolution);
        Ok(())
    }
}

#[async_trait]
impl JobActivator for FakeGateway {
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>> {
        assert!(
            request.max_jobs_to_activate > 0,
            "activation requested {} jobs",
            request.max_jobs_to_activate
        );
        self.requests.lock().unwrap().push(request.clone());

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl JobClient for FakeGateway {
    async fn complete_job(&self, job_key: JobKey, variables: serde_json::Value) -> Result<()> {
        self.resolve(Resolution::Completed(job_key, variables))
    }

    async fn fail_job(&self, job_key: JobKey, retries: i32, error_message: &str) -> Result<()> {
        self.resolve(Resolution::Failed(job_key, retries, error_message.to_string()))
    }

    async fn throw_error(
        &self,
        job_key: JobKey,
        error_code: &str,
        error_message: &str,
    ) -> Result<()> {
        self.resolve(Resolution::Thrown(
            job_key,
            error_code.to_string(),
            error_message.to_string(),
        ))
    }
}

/// Jobs of type "foo" with the given keys
pub fn jobs(keys: RangeInclusive<JobKey>) -> Vec<Job> {
    keys.map(|key| Job::new(key, "foo")).collect()
}
