//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `telemetry_relay` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! Records are read one JSON document per line from FILE (or stdin), queued
//! durably, then delivered. Records that cannot be delivered before the drain
//! timeout stay in the database for the next run.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::process;
use std::time::{Duration, Instant};
use tokio::io::BufReader;

use telemetry_relay::app::{enqueue_lines, print_delivery_statistics, summary_line, wait_for_drain};
use telemetry_relay::initialization::init_logger_with;
use telemetry_relay::{Config, Opt, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting TELEMETRY_RELAY_ENDPOINT in .env without exporting it manually
    if dotenvy::dotenv().is_err() {
        // If .env not found in current dir, try next to the executable
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let opt = Opt::parse();
    let input = opt.file.clone();
    let drain_timeout = Duration::from_secs(opt.drain_timeout_secs);

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    let config = Config::from(opt);
    if config.endpoint.is_none() {
        warn!("No endpoint configured; records will be queued but not delivered");
    }

    let start = Instant::now();
    let pipeline = Pipeline::start(config).context("Failed to start pipeline")?;

    let summary = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            enqueue_lines(BufReader::new(file), &pipeline).await?
        }
        None => enqueue_lines(BufReader::new(tokio::io::stdin()), &pipeline).await?,
    };
    if summary.skipped > 0 {
        warn!("{} input line(s) were skipped", summary.skipped);
    }

    let remaining = match wait_for_drain(&pipeline, drain_timeout).await {
        Ok(remaining) => remaining,
        Err(e) => {
            // Unknown backlog: report failure rather than a clean exit
            eprintln!("telemetry_relay error: could not count queued records: {e}");
            print_delivery_statistics(pipeline.stats());
            process::exit(1);
        }
    };
    print_delivery_statistics(pipeline.stats());
    let line = summary_line(pipeline.stats(), remaining, start.elapsed().as_secs_f64());

    if let Err(e) = pipeline.shutdown().await {
        eprintln!("telemetry_relay error: {e:#}");
        process::exit(1);
    }

    println!("{line}");
    if remaining > 0 {
        process::exit(1);
    }
    Ok(())
}
