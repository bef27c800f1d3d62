//! Input reading.
//!
//! Each non-empty input line is one record. Lines that are not valid JSON are
//! skipped with a warning, since the collector could never accept them.

use std::time::Instant;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::logging::log_progress;
use crate::pipeline::Pipeline;

/// Lines written per store transaction. At most one chunk is held in memory.
const INPUT_CHUNK: usize = 500;

/// What happened to the input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputSummary {
    pub queued: usize,
    pub skipped: usize,
}

/// Queues every JSON line of `reader` into `pipeline`.
///
/// Returns once all lines have been durably written (or rejected).
pub async fn enqueue_lines<R>(reader: R, pipeline: &Pipeline) -> anyhow::Result<InputSummary>
where
    R: AsyncBufRead + Unpin,
{
    enqueue_lines_in_chunks(reader, pipeline, INPUT_CHUNK).await
}

pub(crate) async fn enqueue_lines_in_chunks<R>(
    reader: R,
    pipeline: &Pipeline,
    chunk_size: usize,
) -> anyhow::Result<InputSummary>
where
    R: AsyncBufRead + Unpin,
{
    let start = Instant::now();
    let chunk_size = chunk_size.max(1);
    let mut summary = InputSummary::default();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(trimmed) {
            warn!("Skipping line {line_number}: not valid JSON ({e})");
            summary.skipped += 1;
            continue;
        }
        chunk.push(trimmed.as_bytes().to_vec());
        if chunk.len() == chunk_size {
            write_chunk(pipeline, std::mem::take(&mut chunk), &mut summary).await;
            log_progress(start, summary.queued);
        }
    }
    write_chunk(pipeline, chunk, &mut summary).await;

    debug!(
        "Input done: {} queued, {} skipped",
        summary.queued, summary.skipped
    );
    log_progress(start, summary.queued);
    Ok(summary)
}

async fn write_chunk(pipeline: &Pipeline, chunk: Vec<Vec<u8>>, summary: &mut InputSummary) {
    if chunk.is_empty() {
        return;
    }
    let size = chunk.len();
    match pipeline.enqueue_batch(chunk).await {
        Ok(()) => summary.queued += size,
        Err(e) => {
            warn!("{size} record(s) could not be queued: {e}");
            summary.skipped += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enqueue_lines_skips_invalid_and_blank() {
        let config = Config {
            batching_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let pipeline = Pipeline::start(config).expect("pipeline");
        let input: &[u8] = b"{\"a\":1}\n\nnot json\n  [1,2]  \n";

        let summary = enqueue_lines(input, &pipeline).await.expect("input");
        assert_eq!(
            summary,
            InputSummary {
                queued: 2,
                skipped: 1
            }
        );
        assert_eq!(pipeline.pending_count().await.expect("count"), 2);
        pipeline.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_chunks_keep_every_line_in_order() {
        let config = Config {
            batching_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let pipeline = Pipeline::start(config).expect("pipeline");
        let input: String = (0..7).map(|i| format!("{{\"n\":{i}}}\n")).collect();

        let summary = enqueue_lines_in_chunks(input.as_bytes(), &pipeline, 3)
            .await
            .expect("input");
        assert_eq!(summary.queued, 7);

        let batch = pipeline
            .store()
            .fetch(pipeline.queue_name(), 10, &Default::default())
            .await
            .expect("fetch");
        let lines: Vec<String> = batch
            .records
            .into_iter()
            .map(|r| String::from_utf8(r.data).expect("utf8"))
            .collect();
        let expected: Vec<String> = (0..7).map(|i| format!("{{\"n\":{i}}}")).collect();
        assert_eq!(lines, expected);
        pipeline.shutdown().await.expect("shutdown");
    }
}
