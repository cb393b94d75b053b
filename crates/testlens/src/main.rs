//! testlens: readable summaries of go test output
//!
//! Reads `go test -v` or `go test -json` output from stdin or a file and
//! prints it grouped by package.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use testlens::config::Config;

/// Exit code for runs that could not be processed at all
const FATAL_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Logs go to stderr; stdout carries the rendered output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    match testlens::run::run(&config).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
