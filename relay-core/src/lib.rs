//! Relay Core
//!
//! Core types shared by the Relay job worker crates.
//!
//! This crate contains:
//! - Domain types: the activated [`domain::job::Job`] handed to handlers
//! - DTOs: request and response bodies exchanged with the gateway

pub mod domain;
pub mod dto;
