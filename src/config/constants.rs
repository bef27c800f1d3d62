//! Configuration constants.
//!
//! This module defines the defaults and bounds used throughout the pipeline,
//! including queue sizes, batching delays, and network timeouts.

use std::time::Duration;

/// Default SQLite database path used by the CLI.
pub const DB_PATH: &str = "./telemetry_relay.db";

/// Default queue (table) name.
pub const DEFAULT_QUEUE_NAME: &str = "telemetry_events";

// Queue sizing
/// Maximum number of records kept per queue before the oldest are evicted.
pub const DEFAULT_QUEUE_LIMIT: u32 = 5000;
/// Maximum number of records delivered in a single upload.
pub const DEFAULT_BATCH_SIZE: usize = 16;

// Batching
/// Default batching delay. Zero means "flush as soon as data is available".
pub const DEFAULT_BATCHING_DELAY: Duration = Duration::from_secs(0);
/// Lower bound of the batching delay.
pub const MIN_BATCHING_DELAY: Duration = Duration::from_secs(0);
/// Upper bound of the batching delay.
pub const MAX_BATCHING_DELAY: Duration = Duration::from_secs(60);
/// Delay before re-attempting delivery after a failed upload.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

// Network operation timeouts
/// Whole-request timeout for uploads, in seconds.
pub const UPLOAD_TIMEOUT_SECS: u64 = 30;
/// TCP connection timeout in seconds.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;

// CLI
/// How long the CLI waits for the queue to drain before giving up, in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;
/// Poll interval of the CLI drain loop.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Maximum length of a queue name (queue names become table names).
pub const MAX_QUEUE_NAME_LEN: usize = 64;
