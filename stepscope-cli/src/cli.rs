//! Command line definition.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "stepscope",
    version,
    about = "Code execution tracing service for step-through visualization"
)]
pub struct Cli {
    /// Path to a stepscope.toml; discovered automatically when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log verbosity when RUST_LOG is not set
    #[arg(long, global = true, value_enum, default_value_t = TraceLevel::Warn)]
    pub trace: TraceLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen host, overriding the configuration
        #[arg(long)]
        host: Option<String>,
        /// Listen port, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
        /// Tracer executable, overriding the configuration
        #[arg(long)]
        tracer: Option<PathBuf>,
    },
    /// Trace one file and print the JSON document
    Exec {
        /// Source file to trace
        path: PathBuf,
        /// Language; inferred from the file extension when omitted
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

impl From<TraceLevel> for tracing::Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Error => Self::ERROR,
            TraceLevel::Warn => Self::WARN,
            TraceLevel::Info => Self::INFO,
            TraceLevel::Debug => Self::DEBUG,
            TraceLevel::Trace => Self::TRACE,
        }
    }
}
