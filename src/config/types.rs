//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and library configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::config::constants::{
    DB_PATH, DEFAULT_BATCHING_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_DRAIN_TIMEOUT_SECS,
    DEFAULT_QUEUE_LIMIT, DEFAULT_QUEUE_NAME, MAX_BATCHING_DELAY, MIN_BATCHING_DELAY,
    RETRY_INTERVAL, UPLOAD_TIMEOUT_SECS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Clamps a batching delay into the supported `[0, 60]` second window.
pub fn clamp_batching_delay(delay: Duration) -> Duration {
    delay.clamp(MIN_BATCHING_DELAY, MAX_BATCHING_DELAY)
}

/// Converts a user-supplied number of seconds into a clamped batching delay.
///
/// Negative, NaN and infinite inputs collapse to the nearest bound instead of
/// panicking inside `Duration::from_secs_f64`.
fn batching_delay_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return MIN_BATCHING_DELAY;
    }
    if secs >= MAX_BATCHING_DELAY.as_secs_f64() {
        return MAX_BATCHING_DELAY;
    }
    Duration::from_secs_f64(secs)
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically without any CLI dependencies.
///
/// # Examples
///
/// ```no_run
/// use telemetry_relay::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     endpoint: "https://collector.example.com/batch".parse().ok(),
///     batching_delay: Duration::from_secs(5),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Database path (SQLite file). `None` keeps the queue in memory.
    pub db_path: Option<PathBuf>,

    /// Name of the queue (table) records are written to
    pub queue_name: String,

    /// Collector endpoint. Uploads fail (and records are retained) while unset.
    pub endpoint: Option<Url>,

    /// Maximum number of records kept in the queue; older records are evicted first
    pub max_queue_size: u32,

    /// Maximum number of records per upload
    pub batch_size: usize,

    /// Delay between "data available" and the flush (clamped to 0-60s)
    pub batching_delay: Duration,

    /// Delay before a failed delivery is attempted again
    pub retry_interval: Duration,

    /// Per-upload timeout in seconds
    pub upload_timeout_seconds: u64,

    /// Optional string prepended to every upload body
    pub body_prefix: Option<String>,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            endpoint: None,
            max_queue_size: DEFAULT_QUEUE_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            batching_delay: DEFAULT_BATCHING_DELAY,
            retry_interval: RETRY_INTERVAL,
            upload_timeout_seconds: UPLOAD_TIMEOUT_SECS,
            body_prefix: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

/// Command-line options for the `telemetry_relay` binary.
///
/// # Examples
///
/// ```bash
/// # Deliver newline-delimited JSON events from a file
/// telemetry_relay events.jsonl --endpoint https://collector.example.com/batch
///
/// # Read from stdin, batch for two seconds, keep the queue in a custom file
/// cat events.jsonl | telemetry_relay --endpoint https://collector.example.com/batch \
///     --batching-delay-secs 2 --db-path ./queue.db
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "telemetry_relay",
    about = "Queues JSON events durably and delivers them to a collector in batches."
)]
pub struct Opt {
    /// File with one JSON event per line (reads stdin when omitted)
    #[arg(value_parser)]
    pub file: Option<PathBuf>,

    /// Collector endpoint URL
    #[arg(long, env = "TELEMETRY_RELAY_ENDPOINT")]
    pub endpoint: Option<Url>,

    /// Database path (SQLite file)
    #[arg(long, value_parser, default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Queue (table) name
    #[arg(long, default_value = DEFAULT_QUEUE_NAME)]
    pub queue: String,

    /// Maximum number of records kept in the queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_LIMIT)]
    pub max_queue_size: u32,

    /// Maximum number of records per upload
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Batching delay in seconds (clamped to 0-60)
    #[arg(long, default_value_t = 0.0)]
    pub batching_delay_secs: f64,

    /// Per-upload timeout in seconds
    #[arg(long, default_value_t = UPLOAD_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// String prepended to every upload body (sent as text/plain when set)
    #[arg(long)]
    pub body_prefix: Option<String>,

    /// How long to wait for the queue to drain before exiting
    #[arg(long, default_value_t = DEFAULT_DRAIN_TIMEOUT_SECS)]
    pub drain_timeout_secs: u64,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Self {
        Config {
            db_path: Some(opt.db_path),
            queue_name: opt.queue,
            endpoint: opt.endpoint,
            max_queue_size: opt.max_queue_size,
            batch_size: opt.batch_size,
            batching_delay: batching_delay_from_secs(opt.batching_delay_secs),
            retry_interval: RETRY_INTERVAL,
            upload_timeout_seconds: opt.timeout_seconds,
            body_prefix: opt.body_prefix,
            log_level: opt.log_level,
            log_format: opt.log_format,
        }
    }
}
