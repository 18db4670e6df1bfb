//! Relay CLI
//!
//! Command-line interface for running job workers against the workflow
//! engine gateway and for resolving individual jobs by hand.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay job worker CLI", long_about = None)]
struct Cli {
    /// Gateway address
    #[arg(long, env = "RELAY_ADDRESS", default_value = "http://localhost:8080")]
    address: String,

    /// Timeout of a single gateway call, in milliseconds
    #[arg(long, value_name = "MS")]
    request_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_cli=info,relay_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::new(cli.address, cli.request_timeout);

    handle_command(cli.command, &config).await
}
