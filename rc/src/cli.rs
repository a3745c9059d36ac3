//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// reqcoord - flow-controlled request/reply over publish/subscribe
#[derive(Parser)]
#[command(
    name = "rc",
    about = "Flow-controlled request/reply coordinator over publish/subscribe",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an in-process position service and drive requests through it
    Demo {
        /// Number of requests to send
        #[arg(short = 'n', long)]
        requests: Option<u32>,

        /// Admission closes at this many requests in flight
        #[arg(long)]
        max_in_flight: Option<usize>,

        /// Admission reopens at this many requests in flight
        #[arg(long)]
        min_in_flight: Option<usize>,

        /// Per-request time budget in milliseconds
        #[arg(long)]
        time_budget_ms: Option<u64>,

        /// How long each poll waits for replies, in milliseconds
        #[arg(long)]
        poll_wait_ms: Option<u64>,

        /// Mean simulated service time in milliseconds
        #[arg(long)]
        service_time_ms: Option<u64>,

        /// Simulated service time jitter in milliseconds
        #[arg(long)]
        service_jitter_ms: Option<u64>,

        /// Fail if requests are still unanswered after this many milliseconds
        #[arg(long)]
        give_up_after_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for demo results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format '{}'. Use: text, json", s)),
        }
    }
}

/// Path of the log file the binary writes to
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reqcoord")
        .join("logs")
        .join("reqcoord.log")
}
