//! Main entry point for the stepscope CLI.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use stepscope_config::StepscopeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.trace);

    let config = StepscopeConfig::load(cli.config.as_deref()).await?;
    commands::execute_command(cli.command, config).await
}

/// Set up tracing from the RUST_LOG environment variable or the --trace
/// flag. Priority: RUST_LOG > --trace > default (warn). Output goes to
/// stderr so stdout stays clean for `exec` JSON documents.
fn setup_tracing(trace_level: cli::TraceLevel) {
    use std::io;
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    } else {
        let level: tracing::Level = trace_level.into();
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    }
}
