//! Progress logging utilities.

use log::info;

/// Logs how many input lines were queued so far.
pub fn log_progress(start_time: std::time::Instant, queued: usize) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let rate = if elapsed_secs > 0.0 {
        queued as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Queued {} record(s) in {:.2} seconds (~{:.2} records/sec)",
        queued, elapsed_secs, rate
    );
}
