//! Notification sink.
//!
//! Observable hooks for host-app monitoring and tests: one event before each
//! upload, one after it succeeds or fails. Events are delivered synchronously
//! from the delivery controller's state transitions, so a sink should return
//! quickly and never block.

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error_handling::UploadError;
use crate::storage::RecordId;

/// Delivery lifecycle event for one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The batch is about to be sent.
    WillUpload {
        queue: String,
        ids: Vec<RecordId>,
        payload: Vec<Value>,
    },
    /// The collector accepted the batch; its records are deleted next.
    Succeeded {
        queue: String,
        ids: Vec<RecordId>,
        payload: Vec<Value>,
    },
    /// The upload failed. Retryable failures keep the records queued for a
    /// later flush; a [`UploadError::Serialization`] failure means the records
    /// were dropped, and `payload` is empty when they never decoded.
    Failed {
        queue: String,
        ids: Vec<RecordId>,
        payload: Vec<Value>,
        error: UploadError,
    },
}

impl UploadEvent {
    pub fn queue(&self) -> &str {
        match self {
            UploadEvent::WillUpload { queue, .. }
            | UploadEvent::Succeeded { queue, .. }
            | UploadEvent::Failed { queue, .. } => queue,
        }
    }

    pub fn ids(&self) -> &[RecordId] {
        match self {
            UploadEvent::WillUpload { ids, .. }
            | UploadEvent::Succeeded { ids, .. }
            | UploadEvent::Failed { ids, .. } => ids,
        }
    }

    pub fn payload(&self) -> &[Value] {
        match self {
            UploadEvent::WillUpload { payload, .. }
            | UploadEvent::Succeeded { payload, .. }
            | UploadEvent::Failed { payload, .. } => payload,
        }
    }
}

/// Receives delivery lifecycle events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &UploadEvent);
}

/// Default sink: writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &UploadEvent) {
        match event {
            UploadEvent::WillUpload { queue, ids, .. } => {
                debug!("Uploading {} record(s) from {queue}", ids.len())
            }
            UploadEvent::Succeeded { queue, ids, .. } => {
                debug!("Delivered {} record(s) from {queue}", ids.len())
            }
            UploadEvent::Failed {
                queue, ids, error, ..
            } => warn!(
                "Upload of {} record(s) from {queue} failed: {error}",
                ids.len()
            ),
        }
    }
}

/// Fans events out to any number of async subscribers.
///
/// Slow subscribers lag (and lose the oldest events) rather than holding up
/// delivery.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<UploadEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChannelSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.tx.subscribe()
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: &UploadEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_sink_delivers_to_subscribers() {
        let sink = ChannelSink::new(8);
        let mut rx = sink.subscribe();
        let event = UploadEvent::Succeeded {
            queue: "events".into(),
            ids: vec![1, 2],
            payload: vec![json!({"a": 1}), json!({"a": 2})],
        };
        sink.notify(&event);
        assert_eq!(rx.recv().await.expect("event"), event);
    }

    #[test]
    fn test_channel_sink_without_subscribers() {
        let sink = ChannelSink::new(1);
        sink.notify(&UploadEvent::WillUpload {
            queue: "events".into(),
            ids: vec![],
            payload: vec![],
        });
    }

    #[test]
    fn test_event_accessors() {
        let event = UploadEvent::Failed {
            queue: "q".into(),
            ids: vec![7],
            payload: vec![json!(1)],
            error: UploadError::Status(500),
        };
        assert_eq!(event.queue(), "q");
        assert_eq!(event.ids(), &[7]);
        assert_eq!(event.payload(), &[json!(1)]);
    }
}
