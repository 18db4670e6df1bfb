//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod worker;

pub use job::JobCommands;
pub use worker::WorkerArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a job worker that hands every job to an external command
    Worker(WorkerArgs),

    #[command(flatten)]
    Job(JobCommands),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Worker(args) => worker::run_worker(args, config).await,
        Commands::Job(command) => job::handle_job_command(command, config).await,
    }
}
