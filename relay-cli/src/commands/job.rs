//! Job command handlers
//!
//! One-shot gateway calls: activating a batch of jobs and resolving a job
//! by its key.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use colored::*;
use relay_client::{ClientError, GatewayClient};
use relay_core::domain::job::{Job, JobKey};
use relay_core::dto::job::{
    ActivateJobsRequest, DEFAULT_JOB_TIMEOUT, DEFAULT_JOB_WORKER_NAME, duration_millis,
};

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Activate jobs once and print them
    Activate {
        /// Job type to activate
        job_type: String,

        /// Maximum number of jobs to activate
        #[arg(long, default_value_t = 1)]
        max_jobs: usize,

        /// Lease on the activated jobs, in milliseconds
        #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT.as_millis() as u64)]
        timeout_ms: u64,

        /// Worker name reported to the engine
        #[arg(long, default_value = DEFAULT_JOB_WORKER_NAME)]
        name: String,
    },
    /// Complete a job
    Complete {
        /// Job key
        key: JobKey,

        /// Variables to merge into the process instance, as a JSON object
        #[arg(long, default_value = "{}")]
        variables: String,
    },
    /// Fail a job
    Fail {
        /// Job key
        key: JobKey,

        /// Retries left after this failure
        #[arg(long)]
        retries: i32,

        /// Failure message
        #[arg(long, default_value = "")]
        message: String,

        /// Delay before the job can be activated again, in milliseconds
        #[arg(long)]
        backoff_ms: Option<u64>,
    },
    /// Throw a business error for a job
    ThrowError {
        /// Job key
        key: JobKey,

        /// Error code the process can catch
        #[arg(long)]
        code: String,

        /// Error message
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Set the retries of a job
    UpdateRetries {
        /// Job key
        key: JobKey,

        /// New retry count
        #[arg(long)]
        retries: i32,
    },
}

/// Handle job commands
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The CLI configuration
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        JobCommands::Activate {
            job_type,
            max_jobs,
            timeout_ms,
            name,
        } => activate(&client, job_type, max_jobs, timeout_ms, name).await,
        JobCommands::Complete { key, variables } => complete(&client, key, &variables).await,
        JobCommands::Fail {
            key,
            retries,
            message,
            backoff_ms,
        } => fail(&client, key, retries, &message, backoff_ms).await,
        JobCommands::ThrowError { key, code, message } => {
            client
                .throw_error(key, &code, &message)
                .await
                .map_err(|e| job_error(e, "throw an error for", key))?;
            println!(
                "{} Threw error {} for job {}",
                "✓".green(),
                code.bold(),
                key.to_string().cyan()
            );
            Ok(())
        }
        JobCommands::UpdateRetries { key, retries } => {
            client
                .update_job_retries(key, retries)
                .await
                .map_err(|e| job_error(e, "update retries of", key))?;
            println!(
                "{} Job {} now has {} retries",
                "✓".green(),
                key.to_string().cyan(),
                retries
            );
            Ok(())
        }
    }
}

/// Activate jobs once and print them
async fn activate(
    client: &GatewayClient,
    job_type: String,
    max_jobs: usize,
    timeout_ms: u64,
    name: String,
) -> Result<()> {
    let request = ActivateJobsRequest {
        worker: name,
        timeout: duration_millis(Duration::from_millis(timeout_ms)),
        ..ActivateJobsRequest::new(job_type)
    }
    .with_max_jobs(max_jobs);

    let jobs = client
        .activate_jobs(&request)
        .await
        .context("Failed to activate jobs")?;

    if jobs.is_empty() {
        println!("{}", "No jobs activated.".yellow());
    } else {
        println!("{}", format!("Activated {} job(s):", jobs.len()).bold());
        println!();
        for job in &jobs {
            print_job(job)?;
        }
    }

    Ok(())
}

/// Complete a job with the given JSON variables
async fn complete(client: &GatewayClient, key: JobKey, variables: &str) -> Result<()> {
    let variables = parse_variables(variables)?;

    client
        .complete_job(key, variables)
        .await
        .map_err(|e| job_error(e, "complete", key))?;

    println!("{} Completed job {}", "✓".green(), key.to_string().cyan());
    Ok(())
}

/// Fail a job, optionally with a retry back off
async fn fail(
    client: &GatewayClient,
    key: JobKey,
    retries: i32,
    message: &str,
    backoff_ms: Option<u64>,
) -> Result<()> {
    let result = match backoff_ms {
        Some(ms) => {
            client
                .fail_job_with_backoff(key, retries, message, Duration::from_millis(ms))
                .await
        }
        None => client.fail_job(key, retries, message).await,
    };
    result.map_err(|e| job_error(e, "fail", key))?;

    println!(
        "{} Failed job {} ({} retries left)",
        "✗".red(),
        key.to_string().cyan(),
        retries
    );
    Ok(())
}

/// Explains a failed job command, calling out jobs the gateway does not know
fn job_error(error: ClientError, action: &str, key: JobKey) -> anyhow::Error {
    if error.is_not_found() {
        anyhow!("Job {key} not found; it may be resolved already or its lease expired")
    } else {
        anyhow::Error::new(error).context(format!("Failed to {action} job {key}"))
    }
}

/// Parses variables given on the command line; they must form a JSON object
fn parse_variables(raw: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Variables are not valid JSON")?;
    anyhow::ensure!(value.is_object(), "Variables must be a JSON object");
    Ok(value)
}

/// Print a job with its variables
fn print_job(job: &Job) -> Result<()> {
    println!("  {} Job {}", "▸".cyan(), job.key.to_string().bold());
    println!("    Type:     {}", job.job_type);
    println!("    Process:  {}", job.bpmn_process_id.dimmed());
    println!("    Element:  {}", job.element_id.dimmed());
    println!("    Retries:  {}", job.retries);
    if let Some(deadline) = job.deadline_at() {
        println!(
            "    Deadline: {}",
            deadline.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    println!("    Variables:");
    for line in serde_json::to_string_pretty(&job.variables)?.lines() {
        println!("      {}", line);
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let value = parse_variables(r#"{"amount": 42}"#).unwrap();
        assert_eq!(value["amount"], 42);

        assert!(parse_variables("[1, 2]").is_err());
        assert!(parse_variables("not json").is_err());
    }

    #[test]
    fn test_job_error_calls_out_unknown_jobs() {
        let err = job_error(ClientError::api_error(404, "no such job"), "complete", 7);
        assert!(err.to_string().contains("Job 7 not found"), "{err}");

        let err = job_error(ClientError::api_error(500, "boom"), "complete", 7);
        assert_eq!(err.to_string(), "Failed to complete job 7");
    }
}
