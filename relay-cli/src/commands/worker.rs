//! Worker command
//!
//! Runs a job worker whose handler is an external program. The job
//! variables are written to the program's stdin as JSON. A zero exit code
//! completes the job with the JSON the program printed; any other outcome
//! fails the job with one retry less and the program's stderr as message.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::Args;
use relay_core::domain::job::Job;
use relay_worker::{JobClientHandle, JobHandler, JobWorkerBuilder, WorkerConfig};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Arguments of the worker command
///
/// Tuning options override the `RELAY_*` environment configuration.
#[derive(Args)]
pub struct WorkerArgs {
    /// Job type to work on
    job_type: String,

    /// Program to run for every job, with its arguments
    #[arg(long)]
    handler: String,

    /// Worker name reported to the engine
    #[arg(long)]
    name: Option<String>,

    /// Lease on activated jobs, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum number of jobs kept on this worker
    #[arg(long)]
    max_jobs_active: Option<usize>,

    /// Number of handler programs running at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum time between two activation requests, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Fraction of free capacity that triggers an early poll
    #[arg(long)]
    poll_threshold: Option<f64>,
}

impl WorkerArgs {
    /// Layers the command line options over `config`
    fn apply(&self, mut config: WorkerConfig) -> WorkerConfig {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(max_jobs_active) = self.max_jobs_active {
            config.max_jobs_active = max_jobs_active;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.poll_threshold {
            config.poll_threshold = threshold;
        }
        config
    }
}

/// Run a worker until it is interrupted
pub async fn run_worker(args: WorkerArgs, config: &Config) -> Result<()> {
    let handler = CommandHandler::parse(&args.handler)?;

    let mut worker_config = args.apply(WorkerConfig::from_env()?);
    if let Some(timeout) = config.request_timeout {
        worker_config.request_timeout = timeout;
    }

    info!(
        "Starting worker for job type '{}' against {}",
        args.job_type, config.address
    );

    let worker = JobWorkerBuilder::from_client(config.client())
        .config(worker_config)
        .job_type(args.job_type)
        .handler(handler)
        .open()?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down worker, waiting for running jobs");
            worker.close().await;
        }
        _ = worker.await_close() => {}
    }

    info!("Worker stopped");
    Ok(())
}

/// Handler that runs an external program per job
#[derive(Debug, Clone)]
struct CommandHandler {
    program: String,
    args: Vec<String>,
}

impl CommandHandler {
    /// Splits a command line on whitespace; no shell is involved
    fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Handler command must not be empty");
        };

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Runs the program for `job` and returns the variables it printed
    async fn run(&self, job: &Job) -> Result<serde_json::Value> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("RELAY_JOB_KEY", job.key.to_string())
            .env("RELAY_JOB_TYPE", &job.job_type)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program))?;

        let input = serde_json::to_vec(&job.variables)?;
        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                // A program that ignores its input may close stdin early
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("Could not write job variables to handler: {}", e);
                }
            }
        };

        let ((), output) = tokio::join!(write_input, child.wait_with_output());
        let output = output.with_context(|| format!("Failed to wait for {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }

        parse_output(&output.stdout)
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    async fn handle(&self, client: JobClientHandle, job: Job) {
        match self.run(&job).await {
            Ok(variables) => {
                if let Err(e) = client.complete_job(job.key, variables).await {
                    error!(job_key = job.key, "Failed to complete job: {}", e);
                }
            }
            Err(e) => {
                let retries = (job.retries - 1).max(0);
                warn!(job_key = job.key, retries, "Handler failed: {:#}", e);
                if let Err(e) = client.fail_job(job.key, retries, &format!("{:#}", e)).await {
                    error!(job_key = job.key, "Failed to fail job: {}", e);
                }
            }
        }
    }
}

/// Variables printed by a handler; empty output completes with no variables
fn parse_output(stdout: &[u8]) -> Result<serde_json::Value> {
    let stdout = String::from_utf8_lossy(stdout);
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(serde_json::json!({}));
    }

    let value: serde_json::Value =
        serde_json::from_str(stdout).context("Handler output is not valid JSON")?;
    anyhow::ensure!(value.is_object(), "Handler output must be a JSON object");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let handler = CommandHandler::parse("  python3 handle.py --fast ").unwrap();
        assert_eq!(handler.program, "python3");
        assert_eq!(handler.args, vec!["handle.py", "--fast"]);

        assert!(CommandHandler::parse("   ").is_err());
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output(b"").unwrap(), serde_json::json!({}));
        assert_eq!(parse_output(b"\n  \n").unwrap(), serde_json::json!({}));
        assert_eq!(
            parse_output(br#"{"paid": true}"#).unwrap(),
            serde_json::json!({"paid": true})
        );
        assert!(parse_output(b"done").is_err());
        assert!(parse_output(b"[1]").is_err());
    }

    #[test]
    fn test_args_override_config() {
        let args = WorkerArgs {
            job_type: "payment".to_string(),
            handler: "true".to_string(),
            name: Some("billing".to_string()),
            timeout_ms: None,
            max_jobs_active: Some(8),
            concurrency: Some(2),
            poll_interval_ms: Some(500),
            poll_threshold: None,
        };

        let config = args.apply(WorkerConfig::default());
        assert_eq!(config.name, "billing");
        assert_eq!(config.max_jobs_active, 8);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, WorkerConfig::default().timeout);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_echoes_variables() {
        let handler = CommandHandler::parse("cat").unwrap();
        let mut job = Job::new(1, "payment");
        job.variables = serde_json::json!({"amount": 42});

        let variables = handler.run(&job).await.unwrap();
        assert_eq!(variables, serde_json::json!({"amount": 42}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_failure() {
        let handler = CommandHandler::parse("false").unwrap();
        let job = Job::new(1, "payment");

        assert!(handler.run(&job).await.is_err());
    }
}
