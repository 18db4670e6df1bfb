//! Job handler abstraction
//!
//! A handler receives one activated job together with a [`JobClient`] and
//! is expected to resolve the job through it: complete, fail, or throw a
//! business error. The worker never looks at what the handler did.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use relay_client::JobClient;
use relay_core::domain::job::Job;

/// Shared handle to the job resolution operations
pub type JobClientHandle = Arc<dyn JobClient>;

/// User logic invoked for every activated job
///
/// Invocations for different jobs run concurrently, so implementations must
/// be `Send + Sync`. Plain async closures implement this trait:
///
/// ```no_run
/// use relay_worker::{JobClientHandle, JobHandler};
/// use relay_core::domain::job::Job;
///
/// fn handler() -> impl JobHandler {
///     |client: JobClientHandle, job: Job| async move {
///         let _ = client.complete_job(job.key, serde_json::json!({})).await;
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Handles a single job
    ///
    /// # Arguments
    /// * `client` - Operations to resolve the job with
    /// * `job` - The activated job
    async fn handle(&self, client: JobClientHandle, job: Job);
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn(JobClientHandle, Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, client: JobClientHandle, job: Job) {
        (self)(client, job).await
    }
}
