//! CLI application modules.
//!
//! This module provides input reading, drain waiting, progress logging and
//! statistics printing used by the binary.

pub mod drain;
pub mod input;
pub mod logging;
pub mod statistics;

// Re-export public API
pub use drain::wait_for_drain;
pub use input::{enqueue_lines, InputSummary};
pub use logging::log_progress;
pub use statistics::{print_delivery_statistics, summary_line};
