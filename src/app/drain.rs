//! Waiting for the queue to empty.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::{sleep, Instant};

use crate::config::DRAIN_POLL_INTERVAL;
use crate::error_handling::StoreError;
use crate::pipeline::Pipeline;

/// Polls the queue until it is empty or `timeout` elapses.
///
/// Returns the number of records still queued. A store that cannot be
/// counted is an error, since nothing can then be said about what is left.
pub async fn wait_for_drain(pipeline: &Pipeline, timeout: Duration) -> Result<u64, StoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = pipeline.pending_count().await?;
        if remaining == 0 {
            return Ok(0);
        }
        if Instant::now() >= deadline {
            warn!("{remaining} record(s) still queued after {timeout:?}");
            return Ok(remaining);
        }
        debug!("Waiting for {remaining} record(s) to drain");
        sleep(DRAIN_POLL_INTERVAL).await;
    }
}
