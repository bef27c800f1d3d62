//! Batched delivery.
//!
//! This module provides:
//! - The batch scheduler (debounced flush triggers)
//! - The delivery controller (fetch, upload, delete or release)
//! - The upload payload codec
//! - The uploader trait and its HTTP implementation
//! - The notification sink for delivery lifecycle events

pub mod controller;
pub mod notification;
pub mod payload;
pub mod scheduler;
pub mod uploader;

// Re-export public API
pub use controller::{
    DeliveryController, DeliveryParts, DeliverySettings, FlushOutcome,
};
pub use notification::{ChannelSink, LogSink, NotificationSink, UploadEvent};
pub use scheduler::{BatchScheduler, BatchingDelay, FlushSignals};
pub use uploader::{HttpUploader, UploadRequest, UploadResponse, Uploader};
