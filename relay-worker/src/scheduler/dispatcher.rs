//! Job dispatcher
//!
//! Runs a fixed number of handler slots. Each slot takes the next job from
//! the shared queue, runs the handler on it to completion, and reports back
//! to the poller before taking another one. Handlers run inside their slot;
//! a panicking handler is caught there and the slot moves on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use relay_core::domain::job::Job;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::handler::{JobClientHandle, JobHandler};

/// Handler pool of a job worker
pub struct JobDispatcher {
    job_queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    worker_finished: mpsc::UnboundedSender<()>,
    client: JobClientHandle,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl JobDispatcher {
    pub fn new(
        job_queue: mpsc::Receiver<Job>,
        worker_finished: mpsc::UnboundedSender<()>,
        client: JobClientHandle,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            job_queue: Arc::new(Mutex::new(job_queue)),
            worker_finished,
            client,
            handler,
            concurrency,
            shutdown,
        }
    }

    /// Runs the handler slots until shutdown and waits for all of them
    ///
    /// Jobs already buffered when shutdown is requested are still handled.
    pub async fn run(self) {
        info!("Starting job dispatcher with {} slot(s)", self.concurrency);

        let mut slots = JoinSet::new();
        for slot in 0..self.concurrency {
            slots.spawn(run_slot(
                slot,
                self.job_queue.clone(),
                self.worker_finished.clone(),
                self.client.clone(),
                self.handler.clone(),
                self.shutdown.clone(),
            ));
        }
        drop(self.worker_finished);

        while let Some(result) = slots.join_next().await {
            if let Err(e) = result {
                error!("Dispatcher slot failed: {}", e);
            }
        }

        info!("Job dispatcher stopped");
    }
}

async fn run_slot(
    slot: usize,
    job_queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    worker_finished: mpsc::UnboundedSender<()>,
    client: JobClientHandle,
    handler: Arc<dyn JobHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            job = next_job(&job_queue) => job,
            _ = shutdown.cancelled() => None,
        };
        let Some(job) = job else {
            break;
        };

        let job_key = job.key;
        debug!(slot, job_key, job_type = %job.job_type, "Handling job");

        let invocation = AssertUnwindSafe(handler.handle(client.clone(), job));
        if let Err(panic) = invocation.catch_unwind().await {
            error!(slot, job_key, "Job handler panicked: {}", panic_message(&*panic));
        }

        // The poller may already be gone during shutdown
        let _ = worker_finished.send(());
    }

    debug!(slot, "Dispatcher slot stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn next_job(job_queue: &Mutex<mpsc::Receiver<Job>>) -> Option<Job> {
    job_queue.lock().await.recv().await
}
