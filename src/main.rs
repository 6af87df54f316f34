//! relay - resumable branch workflows for git

mod cli;

use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "git_relay=debug,relay=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("RELAY_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.verbose >= 2)
        .init();
    debug!(verbosity = args.verbose, "relay started");

    let code = match cli::run(args).await {
        Ok(code) => code,
        Err(err) => cli::report_error(&err),
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
