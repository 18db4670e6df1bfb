//! Data Transfer Objects for gateway communication
//!
//! Request and response bodies exchanged with the workflow engine gateway.

pub mod job;
