//! Running job worker handle

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::scheduler::{JobDispatcher, JobPoller};

/// Handle to an open job worker
///
/// Cloning the handle is cheap; every clone controls the same worker.
#[derive(Debug, Clone)]
pub struct JobWorker {
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl JobWorker {
    /// Spawns the poller and dispatcher of a new worker
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn start(
        poller: JobPoller,
        dispatcher: JobDispatcher,
        shutdown: CancellationToken,
    ) -> Self {
        let tasks = TaskTracker::new();
        tasks.spawn(poller.run());
        tasks.spawn(dispatcher.run());
        tasks.close();

        Self { shutdown, tasks }
    }

    /// Stops polling and waits until every handler invocation has returned
    ///
    /// Jobs already buffered are still handled before this returns. Safe to
    /// call more than once and from several clones at the same time.
    pub async fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Closing job worker");
            self.shutdown.cancel();
        }
        self.await_close().await;
    }

    /// Waits until the worker has stopped, without asking it to stop
    pub async fn await_close(&self) {
        self.tasks.wait().await;
    }

    /// Whether the worker has fully stopped
    pub fn is_closed(&self) -> bool {
        self.tasks.is_empty()
    }
}
