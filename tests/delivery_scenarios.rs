//! End-to-end delivery behavior with scripted uploaders.

mod helpers;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use telemetry_relay::{
    Config, FlushOutcome, NotificationSink, Pending, Pipeline, StatKind, Store, StoreLocation,
    UploadError, UploadEvent, UploadResponse,
};

use helpers::{test_config, wait_for_empty, wait_until, MockUploader, RecordingSink};

/// Config where only explicit `flush_now` calls deliver.
fn manual_config() -> Config {
    Config {
        batching_delay: Duration::from_secs(60),
        retry_interval: Duration::from_secs(60),
        ..test_config()
    }
}

async fn enqueue_numbered(pipeline: &Pipeline, range: std::ops::Range<usize>) {
    for i in range {
        pipeline
            .enqueue_json(&json!({ "n": i }))
            .expect("serialize")
            .await
            .expect("enqueue");
    }
}

fn numbered(range: std::ops::Range<usize>) -> Vec<Value> {
    range.map(|i| json!({ "n": i })).collect()
}

#[tokio::test]
async fn test_network_failure_keeps_every_record() {
    let uploader = MockUploader::failing(UploadError::Connectivity("connection refused".into()));
    let sink = RecordingSink::new();
    let pipeline = Pipeline::builder(manual_config())
        .uploader(uploader.clone())
        .sink(sink.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..10).await;

    let outcome = pipeline.flush_now().await;
    assert!(matches!(outcome, FlushOutcome::Failed { records: 10, .. }));
    assert_eq!(pipeline.pending_count().await.expect("count"), 10);

    // The next flush offers the same records again
    pipeline.flush_now().await;
    let calls = uploader.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Value::Array(numbered(0..10)));
    assert_eq!(calls[1], calls[0]);
    assert_eq!(sink.failed().len(), 2);
    assert!(sink.succeeded().is_empty());
}

#[tokio::test]
async fn test_success_empties_queue_and_notifies_once() {
    let uploader = MockUploader::succeeding();
    let sink = RecordingSink::new();
    let pipeline = Pipeline::builder(manual_config())
        .uploader(uploader.clone())
        .sink(sink.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..5).await;

    assert_eq!(
        pipeline.flush_now().await,
        FlushOutcome::Delivered { records: 5 }
    );
    assert_eq!(pipeline.pending_count().await.expect("count"), 0);

    let succeeded = sink.succeeded();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].payload(), numbered(0..5).as_slice());
    assert_eq!(pipeline.stats().get(StatKind::RecordsDelivered), 5);
}

#[tokio::test]
async fn test_undecodable_record_is_dropped_without_blocking_others() {
    let uploader = MockUploader::succeeding();
    let pipeline = Pipeline::builder(manual_config())
        .uploader(uploader.clone())
        .build()
        .expect("pipeline");
    pipeline
        .enqueue(b"\xff\xfe not json".to_vec())
        .await
        .expect("enqueue");
    enqueue_numbered(&pipeline, 0..3).await;

    assert_eq!(
        pipeline.flush_now().await,
        FlushOutcome::Delivered { records: 3 }
    );
    assert_eq!(pipeline.pending_count().await.expect("count"), 0);
    assert_eq!(pipeline.stats().get(StatKind::RecordsDropped), 1);
    assert_eq!(uploader.calls(), vec![Value::Array(numbered(0..3))]);

    // Nothing is left to retry
    assert_eq!(pipeline.flush_now().await, FlushOutcome::Empty);
}

#[tokio::test]
async fn test_dropped_record_is_reported_to_sink() {
    let sink = RecordingSink::new();
    let pipeline = Pipeline::builder(manual_config())
        .uploader(MockUploader::succeeding())
        .sink(sink.clone())
        .build()
        .expect("pipeline");
    pipeline.enqueue(b"not json".to_vec()).await.expect("enqueue");

    assert_eq!(
        pipeline.flush_now().await,
        FlushOutcome::Dropped { records: 1 }
    );
    let failed = sink.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].ids().len(), 1);
    assert!(matches!(
        failed[0],
        UploadEvent::Failed {
            error: UploadError::Serialization(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_overlapping_flushes_take_disjoint_records() {
    let uploader = MockUploader::scripted(
        vec![],
        Ok(UploadResponse { status: 200 }),
        Duration::from_millis(150),
    );
    let config = Config {
        batch_size: 2,
        ..manual_config()
    };
    let pipeline = Pipeline::builder(config)
        .uploader(uploader.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..6).await;

    let (a, b, c) = tokio::join!(
        pipeline.flush_now(),
        pipeline.flush_now(),
        pipeline.flush_now()
    );
    for outcome in [a, b, c] {
        assert_eq!(outcome, FlushOutcome::Delivered { records: 2 });
    }

    let delivered: Vec<Value> = uploader
        .calls()
        .into_iter()
        .flat_map(|body| body.as_array().cloned().unwrap_or_default())
        .collect();
    assert_eq!(delivered.len(), 6);
    let distinct: HashSet<String> = delivered.iter().map(Value::to_string).collect();
    assert_eq!(distinct.len(), 6, "No record was uploaded twice");
    assert_eq!(pipeline.pending_count().await.expect("count"), 0);
}

/// Counts the queue at the moment a success is announced.
struct CountAtSuccess {
    store: Store,
    counts: Mutex<Vec<Pending<u64>>>,
}

impl NotificationSink for CountAtSuccess {
    fn notify(&self, event: &UploadEvent) {
        if let UploadEvent::Succeeded { queue, .. } = event {
            // Queued ahead of the delete that follows this notification
            let count = self.store.count(queue);
            self.counts.lock().expect("counts lock").push(count);
        }
    }
}

#[tokio::test]
async fn test_records_still_stored_when_success_is_announced() {
    let store = Store::open_in_memory();
    let sink = Arc::new(CountAtSuccess {
        store: store.clone(),
        counts: Mutex::new(Vec::new()),
    });
    let pipeline = Pipeline::builder(manual_config())
        .store(store)
        .uploader(MockUploader::succeeding())
        .sink(sink.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..4).await;

    pipeline.flush_now().await;
    let counts: Vec<Pending<u64>> = std::mem::take(&mut *sink.counts.lock().expect("counts lock"));
    assert_eq!(counts.len(), 1);
    for count in counts {
        assert_eq!(count.await.expect("count"), 4);
    }
    assert_eq!(pipeline.pending_count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_background_loop_delivers_everything_once() {
    let uploader = MockUploader::succeeding();
    let config = Config {
        batch_size: 7,
        ..test_config()
    };
    let pipeline = Pipeline::builder(config)
        .uploader(uploader.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..40).await;

    assert!(wait_for_empty(&pipeline, Duration::from_secs(5)).await);
    let delivered: Vec<Value> = uploader
        .calls()
        .into_iter()
        .flat_map(|body| body.as_array().cloned().unwrap_or_default())
        .collect();
    assert_eq!(delivered.len(), 40);
    let distinct: HashSet<String> = delivered.iter().map(Value::to_string).collect();
    assert_eq!(distinct.len(), 40);
    pipeline.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_failed_batch_is_retried_by_the_loop() {
    let uploader = MockUploader::scripted(
        vec![Err(UploadError::Status(503))],
        Ok(UploadResponse { status: 200 }),
        Duration::ZERO,
    );
    let sink = RecordingSink::new();
    let config = Config {
        retry_interval: Duration::from_millis(100),
        ..test_config()
    };
    let pipeline = Pipeline::builder(config)
        .uploader(uploader.clone())
        .sink(sink.clone())
        .build()
        .expect("pipeline");
    // One write, so the whole batch travels together
    let records = (0..3)
        .map(|i| json!({ "n": i }).to_string().into_bytes())
        .collect();
    pipeline.enqueue_batch(records).await.expect("enqueue");

    assert!(wait_for_empty(&pipeline, Duration::from_secs(5)).await);
    assert_eq!(sink.failed().len(), 1);
    assert_eq!(sink.succeeded().len(), 1);
    assert_eq!(sink.succeeded()[0].payload(), numbered(0..3).as_slice());
}

#[tokio::test]
async fn test_missing_endpoint_then_configured() {
    let uploader = MockUploader::succeeding();
    let config = Config {
        endpoint: None,
        ..manual_config()
    };
    let pipeline = Pipeline::builder(config)
        .uploader(uploader.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..2).await;

    assert!(matches!(
        pipeline.flush_now().await,
        FlushOutcome::Failed {
            error: UploadError::EndpointMissing,
            ..
        }
    ));
    assert_eq!(uploader.call_count(), 0);

    pipeline.set_endpoint("http://collector.test/batch".parse().ok());
    assert!(wait_for_empty(&pipeline, Duration::from_secs(5)).await);
    assert_eq!(uploader.call_count(), 1);
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("relay.db");
    let file_config = || Config {
        db_path: Some(path.clone()),
        ..manual_config()
    };

    let offline = Pipeline::builder(file_config())
        .uploader(MockUploader::failing(UploadError::Timeout))
        .build()
        .expect("pipeline");
    enqueue_numbered(&offline, 0..3).await;
    offline.flush_now().await;
    offline.shutdown().await.expect("shutdown");

    // Leftovers are flushed on start, without a new enqueue
    let uploader = MockUploader::succeeding();
    let online = Pipeline::builder(Config {
        batching_delay: Duration::ZERO,
        ..file_config()
    })
    .uploader(uploader.clone())
    .build()
    .expect("pipeline");

    assert!(wait_for_empty(&online, Duration::from_secs(5)).await);
    assert!(
        wait_until(Duration::from_secs(1), || async { uploader.call_count() == 1 }).await
    );
    assert_eq!(uploader.calls(), vec![Value::Array(numbered(0..3))]);
    online.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_body_prefix_is_prepended() {
    use async_trait::async_trait;
    use telemetry_relay::{UploadRequest, Uploader};

    #[derive(Default)]
    struct Capture(Mutex<Vec<UploadRequest>>);

    #[async_trait]
    impl Uploader for Capture {
        async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
            self.0.lock().expect("capture lock").push(request);
            Ok(UploadResponse { status: 202 })
        }
    }

    let capture = Arc::new(Capture::default());
    let config = Config {
        body_prefix: Some("cpkg_none=".into()),
        ..manual_config()
    };
    let pipeline = Pipeline::builder(config)
        .uploader(capture.clone())
        .build()
        .expect("pipeline");
    enqueue_numbered(&pipeline, 0..1).await;
    pipeline.flush_now().await;

    let requests = capture.0.lock().expect("capture lock");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, b"cpkg_none=[{\"n\":0}]".to_vec());
    assert_eq!(requests[0].content_type, "text/plain");
}

#[tokio::test]
async fn test_file_store_falls_back_to_memory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unreachable = dir.path().join("missing").join("relay.db");
    let store = Store::open(StoreLocation::File(unreachable));
    store.add("events", b"{}".to_vec(), 10).await.expect("add");
    assert_eq!(store.count("events").await.expect("count"), 1);
}
