//! rc - reqcoord command-line entry point
//!
//! Runs the in-process demo and inspects configuration.

use std::fs;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use reqcoord::cli::{Cli, Command, OutputFormat, get_log_path};
use reqcoord::config::Config;
use reqcoord::demo::{DemoSummary, run_demo};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Demo {
            requests,
            max_in_flight,
            min_in_flight,
            time_budget_ms,
            poll_wait_ms,
            service_time_ms,
            service_jitter_ms,
            give_up_after_ms,
            format,
        }) => {
            let mut config = config;
            if let Some(requests) = requests {
                config.demo.requests = requests;
            }
            if let Some(max) = max_in_flight {
                config.coordinator.max_in_flight = max;
            }
            if min_in_flight.is_some() {
                config.coordinator.min_in_flight = min_in_flight;
            }
            if let Some(ms) = time_budget_ms {
                config.coordinator.time_budget_ms = ms;
            }
            if let Some(ms) = poll_wait_ms {
                config.coordinator.poll_wait_ms = ms;
            }
            if let Some(ms) = service_time_ms {
                config.demo.service_time_ms = ms;
            }
            if let Some(ms) = service_jitter_ms {
                config.demo.service_jitter_ms = ms;
            }
            if give_up_after_ms.is_some() {
                config.demo.give_up_after_ms = give_up_after_ms;
            }
            cmd_demo(&config, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            println!("No command given. Try `rc --help`.");
            Ok(())
        }
    }
}

async fn cmd_demo(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_demo: called");
    let summary = run_demo(config).await?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &DemoSummary) {
    for reply in &summary.replies {
        match reply.position {
            Some(p) => println!("<< {:>6} x={:.1} y={:.1}", reply.id, p.x, p.y),
            None => println!("<< {:>6} (unexpected payload)", reply.id),
        }
    }
    let report = &summary.report;
    let metrics = &summary.metrics;
    println!();
    println!(
        "All received: {} submitted, {} replies, {} retries in {}ms",
        report.submitted, report.received, report.retries, report.elapsed_ms
    );
    println!(
        "Peak in flight: {}, unmatched replies dropped: {}",
        metrics.peak_in_flight, metrics.replies_unmatched
    );
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
