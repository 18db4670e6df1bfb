//! Job poller
//!
//! Keeps the local job buffer topped up without ever asking the engine for
//! more jobs than there is room for. The poller owns the in-flight counter:
//! every activated job increments it, every finished signal from the
//! dispatcher decrements it.

use std::sync::Arc;
use std::time::Duration;

use relay_client::{ClientError, JobActivator, REQUEST_TIMEOUT_OFFSET, RetryPredicate};
use relay_core::domain::job::Job;
use relay_core::dto::job::ActivateJobsRequest;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;

/// Stand-in for a poll interval too long to represent
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Activation loop of a job worker
pub struct JobPoller {
    activator: Arc<dyn JobActivator>,
    retry: RetryPredicate,
    /// Template request; only the batch size changes between calls
    request: ActivateJobsRequest,
    request_timeout: Duration,
    max_jobs_active: usize,
    poll_interval: Duration,
    threshold: usize,
    job_queue: mpsc::Sender<Job>,
    worker_finished: mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
    /// Jobs handed to the queue and not yet reported finished
    remaining: usize,
}

impl JobPoller {
    /// Creates a poller for `request`, tuned by `config`
    ///
    /// `config` is expected to be sanitized already.
    pub fn new(
        activator: Arc<dyn JobActivator>,
        retry: RetryPredicate,
        request: ActivateJobsRequest,
        config: &WorkerConfig,
        job_queue: mpsc::Sender<Job>,
        worker_finished: mpsc::UnboundedReceiver<()>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            activator,
            retry,
            request,
            request_timeout: config.request_timeout,
            max_jobs_active: config.max_jobs_active,
            poll_interval: config.poll_interval,
            threshold: config.threshold(),
            job_queue,
            worker_finished,
            shutdown,
            remaining: 0,
        }
    }

    /// Runs the polling loop until the shutdown token is cancelled
    ///
    /// Returns the number of jobs still in flight when the loop stopped.
    pub async fn run(mut self) -> usize {
        info!(
            job_type = %self.request.job_type,
            worker = %self.request.worker,
            "Starting job poller (interval: {:?}, capacity: {}, threshold: {})",
            self.poll_interval,
            self.max_jobs_active,
            self.threshold
        );

        self.activate_jobs().await;
        let mut next_poll = self.next_poll_deadline();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                finished = self.worker_finished.recv() => {
                    let Some(()) = finished else {
                        debug!("Dispatcher is gone, stopping job poller");
                        break;
                    };
                    self.job_finished();
                    if !self.should_poll_early() {
                        continue;
                    }
                }
                _ = time::sleep_until(next_poll) => {}
            }

            self.activate_jobs().await;
            next_poll = self.next_poll_deadline();
        }

        info!(
            job_type = %self.request.job_type,
            "Job poller stopped with {} job(s) in flight",
            self.remaining
        );
        self.remaining
    }

    /// Deadline of the next interval tick, pushed out to the far future when
    /// the interval does not fit into an `Instant`
    fn next_poll_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.poll_interval)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    /// Free room in the buffer
    fn capacity_available(&self) -> usize {
        self.max_jobs_active.saturating_sub(self.remaining)
    }

    /// Whether enough room has been freed to poll before the next tick
    fn should_poll_early(&self) -> bool {
        let available = self.capacity_available();
        available > 0 && available >= self.threshold
    }

    fn job_finished(&mut self) {
        match self.remaining.checked_sub(1) {
            Some(remaining) => self.remaining = remaining,
            None => warn!("Received a finished signal with no job in flight"),
        }
    }

    /// Activates as many jobs as fit into the buffer and enqueues them
    async fn activate_jobs(&mut self) {
        let amount = self.capacity_available();
        if amount == 0 {
            debug!("Job buffer is full, skipping activation");
            return;
        }

        let request = self.request.with_max_jobs(amount);
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            result = self.request_jobs(&request) => result,
        };

        let jobs = match result {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(
                    job_type = %self.request.job_type,
                    worker = %self.request.worker,
                    "Failed to activate jobs: {}",
                    e
                );
                return;
            }
        };

        if jobs.is_empty() {
            debug!(job_type = %self.request.job_type, "No jobs available");
            return;
        }

        if jobs.len() > amount {
            warn!(
                "Gateway activated {} job(s) but only {} were requested",
                jobs.len(),
                amount
            );
        }

        debug!(job_type = %self.request.job_type, "Activated {} job(s)", jobs.len());

        for job in jobs {
            self.remaining += 1;
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                sent = self.job_queue.send(job) => {
                    if sent.is_err() {
                        debug!("Job queue closed, dropping activated jobs");
                        return;
                    }
                }
            }
        }
    }

    /// Sends the activation, repeating it while the retry predicate allows
    /// and the call timeout has not run out
    async fn request_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>, ClientError> {
        let timeout = self.request_timeout.saturating_add(REQUEST_TIMEOUT_OFFSET);

        let attempts = async {
            loop {
                match self.activator.activate_jobs(request).await {
                    Ok(jobs) => return Ok(jobs),
                    Err(e) if self.retry.should_retry(&e) => {
                        debug!("Retrying job activation after error: {}", e);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        time::timeout(timeout, attempts)
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
    }
}
