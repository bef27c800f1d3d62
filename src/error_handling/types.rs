//! Error type definitions.
//!
//! This module defines all error types and counter kinds used throughout the pipeline.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// The configured queue cannot be used.
    #[error("Queue configuration error: {0}")]
    QueueError(#[from] StoreError),
}

/// Error types for durable store operations.
///
/// A failed store operation is a no-op from the caller's perspective: nothing is
/// partially applied and nothing is duplicated.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The queue name cannot be used as a table name.
    #[error("Invalid queue name: {0:?}")]
    InvalidQueueName(String),

    /// A queue limit of zero was supplied.
    #[error("Queue limit must be greater than zero")]
    InvalidLimit,

    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreation(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// The store executor has been closed.
    #[error("Store is closed")]
    Closed,
}

/// Outcome of a failed upload.
///
/// Everything except [`UploadError::Serialization`] is retryable: the records stay
/// in the store and are picked up again by a later flush.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// No endpoint URL is configured.
    #[error("No endpoint configured")]
    EndpointMissing,

    /// The collector could not be reached.
    #[error("Connection error: {0}")]
    Connectivity(String),

    /// The request did not complete in time.
    #[error("Upload timed out")]
    Timeout,

    /// The collector answered with a non-2xx status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Any other transport-level failure.
    #[error("Request error: {0}")]
    Request(String),

    /// The payload could not be encoded into the upload format.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl UploadError {
    /// Whether the records behind this failure should be retained and retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UploadError::Serialization(_))
    }

    /// HTTP status code of a server-side failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Counters tracked by [`super::DeliveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum StatKind {
    RecordsEnqueued,
    Flushes,
    EmptyFlushes,
    UploadAttempts,
    UploadSucceeded,
    UploadFailed,
    RecordsDelivered,
    RecordsDropped,
    StoreErrors,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::RecordsEnqueued => "Records enqueued",
            StatKind::Flushes => "Flushes",
            StatKind::EmptyFlushes => "Empty flushes",
            StatKind::UploadAttempts => "Upload attempts",
            StatKind::UploadSucceeded => "Uploads succeeded",
            StatKind::UploadFailed => "Uploads failed",
            StatKind::RecordsDelivered => "Records delivered",
            StatKind::RecordsDropped => "Records dropped (unserializable)",
            StatKind::StoreErrors => "Store errors",
        }
    }
}
