//! telemetry_relay library: durable telemetry queue with batched HTTP delivery
//!
//! Records (opaque JSON blobs) are written to a SQLite-backed queue first and
//! delivered later, in batches, to a collector endpoint. Nothing is lost when
//! the network is down or the process restarts; records are deleted only after
//! the collector accepted them.
//!
//! # Example
//!
//! ```no_run
//! use telemetry_relay::{Config, Pipeline};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     db_path: Some("events.db".into()),
//!     endpoint: "https://collector.example.com/batch".parse().ok(),
//!     batching_delay: Duration::from_secs(5),
//!     ..Default::default()
//! };
//!
//! let pipeline = Pipeline::start(config)?;
//! pipeline.enqueue_json(&serde_json::json!({"etype": "app_start"}))?.await?;
//! pipeline.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Stores and pipelines spawn their
//! background tasks on the runtime they are created in.

pub mod app;
pub mod config;
pub mod delivery;
pub mod error_handling;
pub mod initialization;
pub mod pipeline;
pub mod storage;
pub mod tracker;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel, Opt};
pub use delivery::{
    BatchingDelay, ChannelSink, FlushOutcome, HttpUploader, LogSink, NotificationSink,
    UploadEvent, UploadRequest, UploadResponse, Uploader,
};
pub use error_handling::{DeliveryStats, InitializationError, StatKind, StoreError, UploadError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use storage::{Batch, Pending, Record, RecordId, Store, StoreLocation};
pub use tracker::{Event, QueueTracker, Tracker, TrackerHub};
