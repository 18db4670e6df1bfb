//! Job worker builder
//!
//! The builder is typed by the steps that are still missing: a worker can
//! only be opened once both a job type and a handler have been given, in
//! that order. Tuning options can be set at any point and are optional.
//!
//! ```no_run
//! # async fn run(client: relay_client::GatewayClient) -> relay_worker::Result<()> {
//! use relay_core::domain::job::Job;
//! use relay_worker::{JobClientHandle, JobWorkerBuilder};
//!
//! let worker = JobWorkerBuilder::from_client(client)
//!     .job_type("payment")
//!     .handler(|client: JobClientHandle, job: Job| async move {
//!         let _ = client.complete_job(job.key, serde_json::json!({})).await;
//!     })
//!     .concurrency(8)
//!     .open()?;
//!
//! worker.await_close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use relay_client::{GatewayClient, JobActivator, RetryPredicate};
use relay_core::dto::job::{ActivateJobsRequest, duration_millis};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{
    MAX_JOBS_ACTIVE_LIMIT, MAX_POLL_INTERVAL, WorkerConfig, valid_max_jobs_active,
    valid_poll_interval, valid_poll_threshold,
};
use crate::error::{Result, WorkerError};
use crate::handler::{JobClientHandle, JobHandler};
use crate::scheduler::{JobDispatcher, JobPoller};
use crate::worker::JobWorker;

/// Step-by-step construction of a [`JobWorker`]
///
/// `T` is the job type once set, `H` the handler once set.
pub struct JobWorkerBuilder<T = (), H = ()> {
    activator: Arc<dyn JobActivator>,
    job_client: JobClientHandle,
    retry: RetryPredicate,
    job_type: T,
    handler: H,
    config: WorkerConfig,
}

impl JobWorkerBuilder {
    /// Creates a builder from separate activation and resolution endpoints
    ///
    /// # Arguments
    /// * `activator` - Used by the poller to activate jobs
    /// * `job_client` - Handed to the handler to resolve jobs
    /// * `retry` - Decides which activation errors are retried
    pub fn new(
        activator: Arc<dyn JobActivator>,
        job_client: JobClientHandle,
        retry: RetryPredicate,
    ) -> Self {
        Self {
            activator,
            job_client,
            retry,
            job_type: (),
            handler: (),
            config: WorkerConfig::default(),
        }
    }

    /// Creates a builder that uses one gateway client for everything
    ///
    /// The client's retry predicate and request timeout are adopted.
    pub fn from_client(client: GatewayClient) -> Self {
        let retry = client.retry_predicate().clone();
        let request_timeout = client.request_timeout();
        let client = Arc::new(client);

        Self::new(client.clone(), client, retry).request_timeout(request_timeout)
    }

    /// Sets the type of jobs to activate
    pub fn job_type(self, job_type: impl Into<String>) -> JobWorkerBuilder<String, ()> {
        JobWorkerBuilder {
            activator: self.activator,
            job_client: self.job_client,
            retry: self.retry,
            job_type: job_type.into(),
            handler: (),
            config: self.config,
        }
    }
}

impl JobWorkerBuilder<String, ()> {
    /// Sets the logic invoked for every activated job
    pub fn handler(self, handler: impl JobHandler) -> JobWorkerBuilder<String, Arc<dyn JobHandler>> {
        JobWorkerBuilder {
            activator: self.activator,
            job_client: self.job_client,
            retry: self.retry,
            job_type: self.job_type,
            handler: Arc::new(handler),
            config: self.config,
        }
    }
}

impl<T, H> JobWorkerBuilder<T, H> {
    /// Sets the worker name reported to the engine
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the lease granted on every activated job
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the timeout of a single activation call
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        if request_timeout.is_zero() {
            warn!("Ignoring invalid request timeout {:?}, it must be greater than zero", request_timeout);
        } else {
            self.config.request_timeout = request_timeout;
        }
        self
    }

    /// Sets the capacity of the local job buffer
    pub fn max_jobs_active(mut self, max_jobs_active: usize) -> Self {
        if valid_max_jobs_active(max_jobs_active) {
            self.config.max_jobs_active = max_jobs_active;
        } else {
            warn!(
                "Ignoring invalid max jobs active {}, it must be in 1..={}",
                max_jobs_active, MAX_JOBS_ACTIVE_LIMIT
            );
        }
        self
    }

    /// Sets the number of handler invocations running at once
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        if concurrency == 0 {
            warn!("Ignoring invalid concurrency {}, it must be greater than zero", concurrency);
        } else {
            self.config.concurrency = concurrency;
        }
        self
    }

    /// Sets the maximum time between two activation requests
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        if valid_poll_interval(poll_interval) {
            self.config.poll_interval = poll_interval;
        } else {
            warn!(
                "Ignoring invalid poll interval {:?}, it must be in (0, {:?}]",
                poll_interval, MAX_POLL_INTERVAL
            );
        }
        self
    }

    /// Sets the fraction of free capacity that triggers an early poll
    pub fn poll_threshold(mut self, poll_threshold: f64) -> Self {
        if valid_poll_threshold(poll_threshold) {
            self.config.poll_threshold = poll_threshold;
        } else {
            warn!("Ignoring invalid poll threshold {}, it must be in (0, 1]", poll_threshold);
        }
        self
    }

    /// Restricts the variables fetched with each job
    pub fn fetch_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.fetch_variables = variables.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts activation to the given tenants
    pub fn tenant_ids<I, S>(mut self, tenant_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tenant_ids = tenant_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the whole configuration, sanitizing invalid values
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config.sanitize();
        self
    }
}

impl JobWorkerBuilder<String, Arc<dyn JobHandler>> {
    /// Starts the worker
    ///
    /// Polling begins immediately. Must be called from within a Tokio
    /// runtime.
    pub fn open(self) -> Result<JobWorker> {
        if self.job_type.trim().is_empty() {
            return Err(WorkerError::EmptyJobType);
        }

        let config = self.config;
        let request = activation_request(self.job_type, &config);

        info!(
            job_type = %request.job_type,
            worker = %config.name,
            "Opening job worker (max jobs active: {}, concurrency: {})",
            config.max_jobs_active,
            config.concurrency
        );

        let (job_tx, job_rx) = mpsc::channel(config.max_jobs_active);
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let poller = JobPoller::new(
            self.activator,
            self.retry,
            request,
            &config,
            job_tx,
            finished_rx,
            shutdown.clone(),
        );
        let dispatcher = JobDispatcher::new(
            job_rx,
            finished_tx,
            self.job_client,
            self.handler,
            config.concurrency,
            shutdown.clone(),
        );

        Ok(JobWorker::start(poller, dispatcher, shutdown))
    }
}

fn activation_request(job_type: String, config: &WorkerConfig) -> ActivateJobsRequest {
    ActivateJobsRequest {
        worker: config.name.clone(),
        timeout: duration_millis(config.timeout),
        fetch_variable: config.fetch_variables.clone(),
        request_timeout: duration_millis(config.request_timeout),
        tenant_ids: config.tenant_ids.clone(),
        ..ActivateJobsRequest::new(job_type)
    }
}
