//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (queue limits, batching bounds, timeouts)
//! - The library `Config` and the CLI option types

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{clamp_batching_delay, Config, LogFormat, LogLevel, Opt};
