//! Spillway: adaptive windowed throughput driver for publish/subscribe messaging.
//!
//! # Usage
//!
//! ```bash
//! spillway -s nats://localhost:4222 recv bench
//! spillway -s nats://localhost:4222 send bench 128 --window 1024
//! spillway loopback bench 128 --count 1000000
//! ```
//!
//! Environment variables can also be used:
//! - `NATS_URL`: Server URLs (comma separated)
//! - `NATS_CREDS`: User credentials file
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

mod commands;

use clap::error::ErrorKind;
use clap::Parser;
use spillway::config::{Cli, Command};
use spillway::observability::metrics::init_metrics_with_endpoint;
use spillway::observability::tracing::init_tracing;
use spillway::RunError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are successful exits; every other parse error is 1
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(&cli.log_level, cli.log_json);
    init_metrics_with_endpoint(cli.otel_endpoint.as_deref());

    let result = match &cli.command {
        Command::Send(args) => commands::send::run(&cli, args).await,
        Command::Recv(args) => commands::recv::run(&cli, args).await,
        Command::Loopback(args) => commands::loopback::run(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Run failed");
            eprintln!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit code for a failed run; errors outside [`RunError`] exit 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<RunError>().map_or(1, RunError::exit_code)
}
