//! Core domain types
//!
//! These types represent what the workflow engine hands out to a worker.
//! They are shared between the gateway client (which decodes them) and the
//! worker engine (which dispatches them to handlers).

pub mod job;
