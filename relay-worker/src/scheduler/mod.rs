//! Scheduler layer for the worker
//!
//! Two loops cooperate to move jobs from the engine to the handler:
//! - the poller activates jobs and fills the local buffer
//! - the dispatcher drains the buffer into a fixed pool of handler slots
//!
//! They share only the bounded job queue and the finished signal the
//! dispatcher sends back for every handled job.

pub mod dispatcher;
pub mod poller;

pub use dispatcher::JobDispatcher;
pub use poller::JobPoller;
