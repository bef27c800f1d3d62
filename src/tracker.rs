//! Event trackers.
//!
//! Host applications describe what happened as an [`Event`]; trackers decide
//! whether they care and turn it into a queued record.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::pipeline::Pipeline;

/// A named analytics event with free-form parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub name: String,
    pub parameters: Map<String, Value>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Something that can consume events.
pub trait Tracker: Send + Sync {
    /// Handles `event`. Returns `false` if the tracker ignored it.
    fn process_event(&self, event: &Event) -> bool;
}

/// Serializes events into a pipeline's queue.
///
/// Each record is the event's parameters plus `etype` (the event name) and
/// `ts` (milliseconds since the Unix epoch).
pub struct QueueTracker {
    pipeline: Arc<Pipeline>,
    accepted: Option<HashSet<String>>,
}

impl QueueTracker {
    /// Tracks every event.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        QueueTracker {
            pipeline,
            accepted: None,
        }
    }

    /// Tracks only events whose name is in `names`.
    pub fn only<I, S>(pipeline: Arc<Pipeline>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueueTracker {
            pipeline,
            accepted: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    fn accepts(&self, name: &str) -> bool {
        self.accepted
            .as_ref()
            .map_or(true, |names| names.contains(name))
    }
}

/// Builds the stored form of `event`.
pub fn event_record(event: &Event) -> Value {
    let mut record = event.parameters.clone();
    record.insert("etype".to_string(), Value::String(event.name.clone()));
    record.insert(
        "ts".to_string(),
        Value::from(chrono::Utc::now().timestamp_millis()),
    );
    Value::Object(record)
}

impl Tracker for QueueTracker {
    fn process_event(&self, event: &Event) -> bool {
        if !self.accepts(&event.name) {
            return false;
        }
        match self.pipeline.enqueue_json(&event_record(event)) {
            Ok(_write) => {
                debug!("Queued event {}", event.name);
                true
            }
            Err(e) => {
                warn!("Event {} could not be serialized: {e}", event.name);
                false
            }
        }
    }
}

/// Fans every event out to all registered trackers.
#[derive(Default)]
pub struct TrackerHub {
    trackers: Vec<Arc<dyn Tracker>>,
}

impl TrackerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tracker: Arc<dyn Tracker>) {
        self.trackers.push(tracker);
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

impl Tracker for TrackerHub {
    /// True if at least one tracker handled the event.
    fn process_event(&self, event: &Event) -> bool {
        // Every tracker sees the event, even after one has handled it
        self.trackers
            .iter()
            .fold(false, |handled, t| t.process_event(event) || handled)
    }
}
