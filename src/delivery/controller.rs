//! Delivery controller.
//!
//! One controller per queue. Each flush walks
//! `Idle -> Fetching -> (Empty: Idle) | Uploading -> (Deleting | ReleasingInFlight) -> Idle`.
//!
//! Flushes may overlap (a fast producer and a slow network), so the controller
//! keeps an in-flight set of record ids that have been handed to the uploader
//! and are still awaiting an outcome. A fetch always excludes that set, and the
//! set is only updated while holding the same lock as the fetch, so two flushes
//! can never both pick up the same record.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error_handling::{DeliveryStats, StatKind, UploadError};
use crate::storage::{RecordId, Store};

use super::notification::{NotificationSink, UploadEvent};
use super::payload::{content_type, decode_batch, encode_body};
use super::scheduler::{BatchScheduler, FlushSignals};
use super::uploader::{UploadRequest, UploadResponse, Uploader};

/// How one flush ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing outside the in-flight set was waiting.
    Empty,
    /// Only undeliverable records were found; they were dropped.
    Dropped { records: usize },
    /// The collector accepted `records` records.
    Delivered { records: usize },
    /// The upload failed; `records` records stay queued.
    Failed { records: usize, error: UploadError },
    /// The store could not be read.
    StoreUnavailable,
}

/// Tunables for a controller.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub batch_size: usize,
    pub retry_interval: Duration,
    pub body_prefix: Option<String>,
}

/// Collaborators a controller drives.
pub struct DeliveryParts {
    pub store: Store,
    pub uploader: Arc<dyn Uploader>,
    pub sink: Arc<dyn NotificationSink>,
    pub scheduler: Arc<BatchScheduler>,
    pub stats: Arc<DeliveryStats>,
}

/// Fetches, uploads and resolves batches for a single queue.
pub struct DeliveryController {
    queue: String,
    store: Store,
    uploader: Arc<dyn Uploader>,
    sink: Arc<dyn NotificationSink>,
    scheduler: Arc<BatchScheduler>,
    stats: Arc<DeliveryStats>,
    settings: DeliverySettings,
    endpoint: RwLock<Option<Url>>,
    in_flight: Mutex<HashSet<RecordId>>,
}

impl DeliveryController {
    pub fn new(
        queue: &str,
        endpoint: Option<Url>,
        settings: DeliverySettings,
        parts: DeliveryParts,
    ) -> Self {
        DeliveryController {
            queue: queue.to_string(),
            store: parts.store,
            uploader: parts.uploader,
            sink: parts.sink,
            scheduler: parts.scheduler,
            stats: parts.stats,
            settings,
            endpoint: RwLock::new(endpoint),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Current collector endpoint.
    pub fn endpoint(&self) -> Option<Url> {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the collector endpoint. Affects uploads started afterwards.
    pub fn set_endpoint(&self, endpoint: Option<Url>) {
        match self.endpoint.write() {
            Ok(mut guard) => *guard = endpoint,
            Err(poisoned) => *poisoned.into_inner() = endpoint,
        }
    }

    /// Ids currently awaiting an upload outcome.
    pub async fn in_flight(&self) -> HashSet<RecordId> {
        self.in_flight.lock().await.clone()
    }

    /// Runs one flush to completion.
    pub async fn flush(&self) -> FlushOutcome {
        self.stats.increment(StatKind::Flushes);

        // Fetching: snapshot, fetch and mark under one lock
        let (payload, ids) = {
            let mut in_flight = self.in_flight.lock().await;
            let batch = match self
                .store
                .fetch(&self.queue, self.settings.batch_size, &in_flight)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Flush of {} could not read the store: {e}", self.queue);
                    self.stats.increment(StatKind::StoreErrors);
                    self.scheduler.schedule_retry(self.settings.retry_interval);
                    return FlushOutcome::StoreUnavailable;
                }
            };

            if batch.is_empty() {
                debug!("No records to deliver from {}", self.queue);
                self.stats.increment(StatKind::EmptyFlushes);
                return FlushOutcome::Empty;
            }

            let decoded = decode_batch(batch);
            if !decoded.poison.is_empty() {
                self.drop_undecodable(decoded.poison.clone());
            }
            if decoded.ids.is_empty() {
                drop(in_flight);
                // More records may be waiting behind the dropped ones
                self.scheduler.notify();
                return FlushOutcome::Dropped {
                    records: decoded.poison.len(),
                };
            }

            in_flight.extend(decoded.ids.iter().copied());
            (decoded.values, decoded.ids)
        };

        // Uploading
        self.sink.notify(&UploadEvent::WillUpload {
            queue: self.queue.clone(),
            ids: ids.clone(),
            payload: payload.clone(),
        });
        self.stats.increment(StatKind::UploadAttempts);

        match self.upload(&payload).await {
            Ok(response) => self.resolve_success(payload, ids, response).await,
            Err(error) => self.resolve_failure(payload, ids, error).await,
        }
    }

    async fn upload(&self, payload: &[Value]) -> Result<UploadResponse, UploadError> {
        let endpoint = self.endpoint().ok_or(UploadError::EndpointMissing)?;
        let prefix = self.settings.body_prefix.as_deref();
        let body = encode_body(payload, prefix)?;
        debug!(
            "Posting {} record(s) ({} bytes) from {} to {endpoint}",
            payload.len(),
            body.len(),
            self.queue
        );
        self.uploader
            .upload(UploadRequest {
                endpoint,
                body,
                content_type: content_type(prefix),
            })
            .await
    }

    /// Deleting -> Idle.
    async fn resolve_success(
        &self,
        payload: Vec<Value>,
        ids: Vec<RecordId>,
        response: UploadResponse,
    ) -> FlushOutcome {
        let records = ids.len();
        debug!(
            "Collector answered {} for {records} record(s) from {}",
            response.status, self.queue
        );

        self.stats.increment(StatKind::UploadSucceeded);
        self.stats.add(StatKind::RecordsDelivered, records);
        self.sink.notify(&UploadEvent::Succeeded {
            queue: self.queue.clone(),
            ids: ids.clone(),
            payload,
        });

        // Queued before the ids leave the in-flight set, so no later fetch can see them
        let deletion = self.store.delete(&self.queue, ids.clone());
        self.release(&ids).await;
        if let Err(e) = deletion.await {
            warn!("Delivered records of {} could not be deleted: {e}", self.queue);
            self.stats.increment(StatKind::StoreErrors);
        }

        // Keep draining whatever is left
        self.scheduler.notify();
        FlushOutcome::Delivered { records }
    }

    /// ReleasingInFlight -> Idle.
    async fn resolve_failure(
        &self,
        payload: Vec<Value>,
        ids: Vec<RecordId>,
        error: UploadError,
    ) -> FlushOutcome {
        let records = ids.len();
        warn!(
            "Upload of {records} record(s) from {} failed: {error}",
            self.queue
        );
        self.stats.increment(StatKind::UploadFailed);

        if !error.is_retryable() {
            self.drop_records(ids.clone());
        }
        self.release(&ids).await;

        self.sink.notify(&UploadEvent::Failed {
            queue: self.queue.clone(),
            ids,
            payload,
            error: error.clone(),
        });

        self.scheduler.schedule_retry(self.settings.retry_interval);
        FlushOutcome::Failed { records, error }
    }

    async fn release(&self, ids: &[RecordId]) {
        let mut in_flight = self.in_flight.lock().await;
        for id in ids {
            in_flight.remove(id);
        }
    }

    /// Drops stored records that are not JSON and tells the sink about them.
    fn drop_undecodable(&self, ids: Vec<RecordId>) {
        self.drop_records(ids.clone());
        self.sink.notify(&UploadEvent::Failed {
            queue: self.queue.clone(),
            ids,
            payload: Vec::new(),
            error: UploadError::Serialization("stored record is not valid JSON".to_string()),
        });
    }

    /// Deletes records that can never be delivered.
    fn drop_records(&self, ids: Vec<RecordId>) {
        warn!(
            "Dropping {} undeliverable record(s) from {}",
            ids.len(),
            self.queue
        );
        self.stats.add(StatKind::RecordsDropped, ids.len());
        // Queued now; the executor applies it before any fetch issued later
        let _ = self.store.delete(&self.queue, ids);
    }

    /// Starts the delivery loop: one flush per scheduler signal.
    ///
    /// Flushes run as separate tasks so a slow upload never delays the next
    /// one. On cancellation the loop stops taking signals and waits for the
    /// flushes already running.
    pub fn spawn(
        self: Arc<Self>,
        mut signals: FlushSignals,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut flushes = JoinSet::new();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = signals.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        let controller = Arc::clone(&self);
                        flushes.spawn(async move { controller.flush().await });
                    }
                    Some(finished) = flushes.join_next(), if !flushes.is_empty() => {
                        if let Err(e) = finished {
                            warn!("Flush task of {} ended abnormally: {e}", self.queue);
                        }
                    }
                }
            }

            while let Some(finished) = flushes.join_next().await {
                if let Err(e) = finished {
                    warn!("Flush task of {} ended abnormally: {e}", self.queue);
                }
            }
            debug!("Delivery loop for {} stopped", self.queue);
        })
    }
}
