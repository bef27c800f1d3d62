//! Pipeline wiring.
//!
//! A [`Pipeline`] owns one queue end to end: the durable store, the batch
//! scheduler, and the delivery controller with its background loop. Producers
//! only ever call [`Pipeline::enqueue`]; everything after that is automatic.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::delivery::{
    BatchScheduler, BatchingDelay, DeliveryController, DeliveryParts, DeliverySettings,
    FlushOutcome, HttpUploader, LogSink, NotificationSink, Uploader,
};
use crate::error_handling::{DeliveryStats, InitializationError, StatKind, StoreError};
use crate::storage::{validate_queue_name, Pending, Store, StoreLocation};

/// Assembles a [`Pipeline`] from a [`Config`] and optional collaborators.
pub struct PipelineBuilder {
    config: Config,
    store: Option<Store>,
    uploader: Option<Arc<dyn Uploader>>,
    sink: Option<Arc<dyn NotificationSink>>,
    batching_delay: Option<BatchingDelay>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        PipelineBuilder {
            config,
            store: None,
            uploader: None,
            sink: None,
            batching_delay: None,
        }
    }

    /// Shares an already running store instead of opening `config.db_path`.
    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the HTTP uploader.
    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Replaces the logging notification sink.
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Overrides `config.batching_delay`, e.g. with a dynamic provider.
    pub fn batching_delay(mut self, delay: BatchingDelay) -> Self {
        self.batching_delay = Some(delay);
        self
    }

    /// Validates the configuration and starts the delivery loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Pipeline, InitializationError> {
        let config = self.config;
        validate_queue_name(&config.queue_name)?;
        if config.max_queue_size == 0 {
            return Err(StoreError::InvalidLimit.into());
        }

        let store = match self.store {
            Some(store) => store,
            None => Store::open(StoreLocation::from_path(config.db_path.as_deref())),
        };
        let uploader: Arc<dyn Uploader> = match self.uploader {
            Some(uploader) => uploader,
            None => Arc::new(HttpUploader::with_timeout(config.upload_timeout_seconds)?),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        let delay = self
            .batching_delay
            .unwrap_or(BatchingDelay::Fixed(config.batching_delay));

        let (scheduler, signals) = BatchScheduler::new(delay);
        let scheduler = Arc::new(scheduler);
        let stats = Arc::new(DeliveryStats::new());

        let controller = Arc::new(DeliveryController::new(
            &config.queue_name,
            config.endpoint.clone(),
            DeliverySettings {
                batch_size: config.batch_size.max(1),
                retry_interval: config.retry_interval,
                body_prefix: config.body_prefix.clone(),
            },
            DeliveryParts {
                store: store.clone(),
                uploader,
                sink,
                scheduler: Arc::clone(&scheduler),
                stats: Arc::clone(&stats),
            },
        ));

        let cancel = CancellationToken::new();
        let worker = Arc::clone(&controller).spawn(signals, cancel.clone());

        info!(
            "Pipeline for {} started (limit {}, batch size {}, delay {:?})",
            config.queue_name,
            config.max_queue_size,
            config.batch_size,
            scheduler.current_delay()
        );

        // Records left over from a previous run are delivered without waiting
        // for the next enqueue.
        scheduler.notify();

        Ok(Pipeline {
            queue_name: config.queue_name,
            max_queue_size: config.max_queue_size,
            store,
            scheduler,
            controller,
            stats,
            cancel,
            worker: Some(worker),
        })
    }
}

/// A running durable queue with batched delivery.
pub struct Pipeline {
    queue_name: String,
    max_queue_size: u32,
    store: Store,
    scheduler: Arc<BatchScheduler>,
    controller: Arc<DeliveryController>,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Starts a pipeline with the default uploader and sink.
    pub fn start(config: Config) -> Result<Self, InitializationError> {
        PipelineBuilder::new(config).build()
    }

    /// Durably queues one record, then requests a flush.
    ///
    /// The write is ordered before any flush triggered afterwards; awaiting
    /// the returned handle is only needed to observe the write's outcome.
    pub fn enqueue(&self, record: Vec<u8>) -> Pending<()> {
        self.enqueue_batch(vec![record])
    }

    /// Durably queues several records in one transaction.
    pub fn enqueue_batch(&self, records: Vec<Vec<u8>>) -> Pending<()> {
        let count = records.len();
        let write = self.store.add_batch(&self.queue_name, records, self.max_queue_size);
        let scheduler = Arc::clone(&self.scheduler);
        let stats = Arc::clone(&self.stats);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = write.await;
            match &result {
                Ok(()) => {
                    stats.add(StatKind::RecordsEnqueued, count);
                    scheduler.notify();
                }
                Err(e) => {
                    warn!("Enqueue of {count} record(s) failed: {e}");
                    stats.increment(StatKind::StoreErrors);
                }
            }
            let _ = tx.send(result);
        });

        Pending::new(rx)
    }

    /// Serializes `value` as JSON and queues it.
    pub fn enqueue_json<T: Serialize>(&self, value: &T) -> Result<Pending<()>, serde_json::Error> {
        Ok(self.enqueue(serde_json::to_vec(value)?))
    }

    /// Requests a flush under the usual debounce rules.
    pub fn request_flush(&self) {
        self.scheduler.notify();
    }

    /// Runs one flush right away, bypassing the scheduler.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.controller.flush().await
    }

    pub fn endpoint(&self) -> Option<Url> {
        self.controller.endpoint()
    }

    /// Changes the collector endpoint and, if one is set, flushes right away.
    pub fn set_endpoint(&self, endpoint: Option<Url>) {
        debug!(
            "Endpoint for {} set to {}",
            self.queue_name,
            endpoint.as_ref().map_or("<none>", Url::as_str)
        );
        let has_endpoint = endpoint.is_some();
        self.controller.set_endpoint(endpoint);
        if has_endpoint {
            // Do not wait out a retry armed while the endpoint was missing
            self.scheduler.trigger_now();
        }
    }

    /// Changes the batching delay for flushes scheduled from now on.
    pub fn set_batching_delay(&self, delay: BatchingDelay) {
        self.scheduler.set_delay(delay);
    }

    pub fn batching_delay(&self) -> Duration {
        self.scheduler.current_delay()
    }

    /// Number of records still waiting in the store (in flight included).
    pub async fn pending_count(&self) -> Result<u64, StoreError> {
        self.store.count(&self.queue_name).await
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Stops the delivery loop, waits for in-progress uploads, then closes
    /// the store. Undelivered records remain on disk for the next run.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Delivery loop for {} ended abnormally: {e}", self.queue_name);
            }
        }
        self.store.close().await?;
        info!("Pipeline for {} stopped", self.queue_name);
        Ok(())
    }
}

impl Drop for Pipeline {
    /// Stops the delivery loop of a pipeline that was never shut down.
    /// Uploads already running finish on their own.
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("Pipeline for {} dropped without shutdown", self.queue_name);
        }
        self.cancel.cancel();
    }
}
