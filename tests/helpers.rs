// Shared test helpers for pipeline and store tests.
//
// This module provides scripted uploaders, recording sinks and polling helpers
// used across multiple test files.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use telemetry_relay::{
    Config, NotificationSink, Pipeline, UploadError, UploadEvent, UploadRequest, UploadResponse,
    Uploader,
};

/// Uploader that answers from a script, then with a fallback outcome.
///
/// Every request body is recorded as decoded JSON.
pub struct MockUploader {
    script: Mutex<VecDeque<Result<UploadResponse, UploadError>>>,
    fallback: Result<UploadResponse, UploadError>,
    delay: Duration,
    calls: Mutex<Vec<Value>>,
}

#[allow(dead_code)] // Used by other test files
impl MockUploader {
    pub fn succeeding() -> Arc<Self> {
        Self::scripted(vec![], Ok(UploadResponse { status: 200 }), Duration::ZERO)
    }

    pub fn failing(error: UploadError) -> Arc<Self> {
        Self::scripted(vec![], Err(error), Duration::ZERO)
    }

    pub fn scripted(
        script: Vec<Result<UploadResponse, UploadError>>,
        fallback: Result<UploadResponse, UploadError>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(MockUploader {
            script: Mutex::new(script.into()),
            fallback,
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Decoded bodies of every upload so far.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        let body: Value = serde_json::from_slice(&request.body).expect("upload body is JSON");
        self.calls.lock().expect("calls lock").push(body);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UploadEvent>>,
}

#[allow(dead_code)] // Used by other test files
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn succeeded(&self) -> Vec<UploadEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, UploadEvent::Succeeded { .. }))
            .collect()
    }

    pub fn failed(&self) -> Vec<UploadEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, UploadEvent::Failed { .. }))
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &UploadEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

/// Config for tests: in-memory store, a dummy endpoint, no batching delay.
#[allow(dead_code)] // Used by other test files
pub fn test_config() -> Config {
    Config {
        endpoint: "http://collector.test/batch".parse().ok(),
        ..Default::default()
    }
}

/// Polls `check` every 10ms until it holds or `timeout` elapses.
#[allow(dead_code)] // Used by other test files
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Waits until `pipeline` has no queued records.
#[allow(dead_code)] // Used by other test files
pub async fn wait_for_empty(pipeline: &Pipeline, timeout: Duration) -> bool {
    wait_until(timeout, || async {
        pipeline.pending_count().await.expect("count") == 0
    })
    .await
}
