//! Job-related API endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use relay_core::domain::job::{Job, JobKey};
use relay_core::dto::job::{
    ActivateJobsRequest, ActivateJobsResponse, CompleteJobRequest, FailJobRequest,
    ThrowErrorRequest, UpdateJobRetriesRequest, duration_millis,
};
use serde::Serialize;

use crate::api::{JobActivator, JobClient};
use crate::error::{ClientError, Result};
use crate::{GatewayClient, REQUEST_TIMEOUT_OFFSET};

impl GatewayClient {
    // =============================================================================
    // Job Activation
    // =============================================================================

    /// Activate a batch of jobs
    ///
    /// Retries through the client's retry predicate. Workers do not use this
    /// method; they go through [`JobActivator`], which sends a single
    /// attempt and leaves retrying to the poller.
    ///
    /// # Arguments
    /// * `request` - Job type, batch size, lease and filters
    ///
    /// # Returns
    /// The activated jobs, possibly none
    pub async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>> {
        check_batch_size(request)?;
        let timeout = self.activation_timeout(request);
        self.send_with_retry(timeout, || self.post_activation(request, timeout))
            .await
    }

    /// Call timeout for an activation: the long polling window plus an offset
    fn activation_timeout(&self, request: &ActivateJobsRequest) -> Duration {
        let long_poll = u64::try_from(request.request_timeout)
            .ok()
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
            .unwrap_or(self.request_timeout);
        long_poll.saturating_add(REQUEST_TIMEOUT_OFFSET)
    }

    async fn post_activation(
        &self,
        request: &ActivateJobsRequest,
        timeout: Duration,
    ) -> Result<Vec<Job>> {
        let url = format!("{}/v2/jobs/activation", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        let body: ActivateJobsResponse = self.handle_response(response).await?;
        Ok(body.jobs)
    }

    // =============================================================================
    // Job Resolution
    // =============================================================================

    /// Complete a job
    ///
    /// # Arguments
    /// * `job_key` - The key of the activated job
    /// * `variables` - JSON object merged into the process instance
    pub async fn complete_job(&self, job_key: JobKey, variables: serde_json::Value) -> Result<()> {
        let url = format!("{}/v2/jobs/{}/completion", self.base_url, job_key);
        self.send_command(Method::POST, url, CompleteJobRequest { variables })
            .await
    }

    /// Fail a job
    ///
    /// # Arguments
    /// * `job_key` - The key of the activated job
    /// * `retries` - Attempts left; zero raises an incident
    /// * `error_message` - Why the job failed
    pub async fn fail_job(&self, job_key: JobKey, retries: i32, error_message: &str) -> Result<()> {
        self.fail_job_with_backoff(job_key, retries, error_message, Duration::ZERO)
            .await
    }

    /// Fail a job and keep it from being activated again for `retry_back_off`
    pub async fn fail_job_with_backoff(
        &self,
        job_key: JobKey,
        retries: i32,
        error_message: &str,
        retry_back_off: Duration,
    ) -> Result<()> {
        let url = format!("{}/v2/jobs/{}/failure", self.base_url, job_key);
        let body = FailJobRequest {
            retries,
            error_message: error_message.to_string(),
            retry_back_off: duration_millis(retry_back_off),
        };

        self.send_command(Method::POST, url, body).await
    }

    /// Throw a business error from a job
    ///
    /// # Arguments
    /// * `job_key` - The key of the activated job
    /// * `error_code` - Code matched against error events in the process
    /// * `error_message` - Additional context
    pub async fn throw_error(
        &self,
        job_key: JobKey,
        error_code: &str,
        error_message: &str,
    ) -> Result<()> {
        let url = format!("{}/v2/jobs/{}/error", self.base_url, job_key);
        let body = ThrowErrorRequest {
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
        };

        self.send_command(Method::POST, url, body).await
    }

    /// Update the retries left on a job
    ///
    /// # Arguments
    /// * `job_key` - The job key
    /// * `retries` - New number of retries
    pub async fn update_job_retries(&self, job_key: JobKey, retries: i32) -> Result<()> {
        let url = format!("{}/v2/jobs/{}", self.base_url, job_key);
        self.send_command(Method::PATCH, url, UpdateJobRetriesRequest { retries })
            .await
    }

    /// Sends a JSON command that answers without content
    async fn send_command<B>(&self, method: Method, url: String, body: B) -> Result<()>
    where
        B: Serialize + Sync,
    {
        let (method, url, body) = (&method, &url, &body);

        self.send_with_retry(self.request_timeout, || async move {
            let response = self
                .client
                .request(method.clone(), url)
                .timeout(self.request_timeout)
                .json(body)
                .send()
                .await?;
            self.handle_empty_response(response).await
        })
        .await
    }
}

/// A batch size of zero or less is never sent to the gateway
fn check_batch_size(request: &ActivateJobsRequest) -> Result<()> {
    if request.max_jobs_to_activate <= 0 {
        return Err(ClientError::InvalidRequest(format!(
            "cannot activate {} jobs",
            request.max_jobs_to_activate
        )));
    }
    Ok(())
}

#[async_trait]
impl JobActivator for GatewayClient {
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>> {
        check_batch_size(request)?;
        self.post_activation(request, self.activation_timeout(request))
            .await
    }
}

#[async_trait]
impl JobClient for GatewayClient {
    async fn complete_job(&self, job_key: JobKey, variables: serde_json::Value) -> Result<()> {
        GatewayClient::complete_job(self, job_key, variables).await
    }

    async fn fail_job(&self, job_key: JobKey, retries: i32, error_message: &str) -> Result<()> {
        GatewayClient::fail_job(self, job_key, retries, error_message).await
    }

    async fn throw_error(
        &self,
        job_key: JobKey,
        error_code: &str,
        error_message: &str,
    ) -> Result<()> {
        GatewayClient::throw_error(self, job_key, error_code, error_message).await
    }
}
