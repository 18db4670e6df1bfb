//! Relay Worker
//!
//! Client-side job worker for the workflow engine.
//!
//! A worker activates jobs of one type from the gateway and runs a user
//! handler on each of them. It keeps at most `max_jobs_active` jobs on the
//! client and runs at most `concurrency` handlers at once.
//!
//! Architecture:
//! - Builder: validates tuning options and opens the worker
//! - Scheduler: the poller fills a bounded job queue, the dispatcher drains
//!   it into handler slots and reports every finished job back
//! - Worker: handle used to stop the worker and wait for it

pub mod builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use builder::JobWorkerBuilder;
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use handler::{JobClientHandle, JobHandler};
pub use worker::JobWorker;
