mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use pnlbot_core::SecretResolver;
use uuid::Uuid;

use crate::cli::Cli;
use crate::commands::Context;
use crate::error::CliError;
use crate::output::{Envelope, Meta};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr; stdout carries only the JSON result.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let started = Instant::now();
    let command = commands::name(&cli.command);

    let context = Context::from_cli(&cli, &SecretResolver::from_process())?;
    let result = commands::run(&cli, &context).await?;

    let envelope = Envelope {
        meta: Meta {
            request_id: Uuid::new_v4().to_string(),
            command,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            warnings: result.warnings,
        },
        data: result.data,
    };
    output::render(&envelope, cli.pretty)
}
