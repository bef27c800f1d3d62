//! The durable store and its single in-order executor.
//!
//! Every operation on every queue is turned into a command and pushed onto one
//! unbounded FIFO channel. A single task drains that channel and applies the
//! commands one after another against the store's only SQLite connection, so
//! store state needs no locks: program order of the calls is the order in
//! which they are applied.

use std::collections::HashSet;

use log::{debug, error, info, warn};
use sqlx::{Connection, SqliteConnection};
use tokio::sync::{mpsc, oneshot};

use crate::error_handling::StoreError;

use super::connection::{open_connection, StoreLocation};
use super::models::{Batch, RecordId};
use super::pending::Pending;
use super::queue;

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Add {
        queue: String,
        blobs: Vec<Vec<u8>>,
        limit: u32,
        reply: Reply<()>,
    },
    Fetch {
        queue: String,
        max_count: usize,
        exclude: HashSet<RecordId>,
        reply: Reply<Batch>,
    },
    Delete {
        queue: String,
        ids: Vec<RecordId>,
        reply: Reply<()>,
    },
    Count {
        queue: String,
        reply: Reply<u64>,
    },
    Close {
        reply: Reply<()>,
    },
}

/// Handle to the durable store.
///
/// Cloning the handle is cheap; all clones feed the same executor. The
/// executor (and with it the connection) lives until [`Store::close`] is
/// called or the last handle is dropped.
///
/// # Requirements
///
/// `Store::open` spawns the executor task, so it must be called from within a
/// Tokio runtime.
#[derive(Clone, Debug)]
pub struct Store {
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Add { queue, blobs, .. } => write!(f, "Add({queue}, {} blobs)", blobs.len()),
            Command::Fetch {
                queue, max_count, ..
            } => write!(f, "Fetch({queue}, {max_count})"),
            Command::Delete { queue, ids, .. } => write!(f, "Delete({queue}, {} ids)", ids.len()),
            Command::Count { queue, .. } => write!(f, "Count({queue})"),
            Command::Close { .. } => write!(f, "Close"),
        }
    }
}

impl Store {
    /// Starts a store at `location`.
    ///
    /// The connection is opened lazily by the executor on the first operation,
    /// and only once; a file that cannot be opened falls back to memory.
    pub fn open(location: StoreLocation) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_executor(location, rx));
        Store { commands }
    }

    /// Starts a store backed by a private in-memory database.
    pub fn open_in_memory() -> Self {
        Self::open(StoreLocation::Memory)
    }

    /// Appends one record to `queue`, then evicts the oldest records until at
    /// most `limit` remain.
    pub fn add(&self, queue: &str, blob: Vec<u8>, limit: u32) -> Pending<()> {
        self.add_batch(queue, vec![blob], limit)
    }

    /// Appends several records to `queue` in one transaction, then trims to
    /// `limit`. No single `add` can interleave with the batch.
    pub fn add_batch(&self, queue: &str, blobs: Vec<Vec<u8>>, limit: u32) -> Pending<()> {
        if let Err(e) = queue::validate_queue_name(queue) {
            warn!("Rejected add: {e}");
            return Pending::failed(e);
        }
        if limit == 0 {
            warn!("Rejected add to {queue}: limit must be greater than zero");
            return Pending::failed(StoreError::InvalidLimit);
        }
        self.submit(|reply| Command::Add {
            queue: queue.to_string(),
            blobs,
            limit,
            reply,
        })
    }

    /// Fetches up to `max_count` records of `queue`, oldest first, skipping
    /// every id in `exclude`. An empty or fully excluded queue yields an empty
    /// batch.
    pub fn fetch(&self, queue: &str, max_count: usize, exclude: &HashSet<RecordId>) -> Pending<Batch> {
        if let Err(e) = queue::validate_queue_name(queue) {
            return Pending::failed(e);
        }
        self.submit(|reply| Command::Fetch {
            queue: queue.to_string(),
            max_count,
            exclude: exclude.clone(),
            reply,
        })
    }

    /// Deletes records of `queue` by id. Ids that do not exist are ignored.
    pub fn delete(&self, queue: &str, ids: Vec<RecordId>) -> Pending<()> {
        if let Err(e) = queue::validate_queue_name(queue) {
            return Pending::failed(e);
        }
        self.submit(|reply| Command::Delete {
            queue: queue.to_string(),
            ids,
            reply,
        })
    }

    /// Number of records currently stored in `queue`.
    pub fn count(&self, queue: &str) -> Pending<u64> {
        if let Err(e) = queue::validate_queue_name(queue) {
            return Pending::failed(e);
        }
        self.submit(|reply| Command::Count {
            queue: queue.to_string(),
            reply,
        })
    }

    /// Closes the connection once every previously queued operation has been
    /// applied. Operations issued afterwards resolve to [`StoreError::Closed`].
    pub fn close(&self) -> Pending<()> {
        self.submit(|reply| Command::Close { reply })
    }

    fn submit<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        // A closed executor drops the command and with it `reply`
        let _ = self.commands.send(command(reply));
        Pending::new(rx)
    }
}

/// Executor-owned state. Only ever touched from `run_executor`.
struct Executor {
    location: StoreLocation,
    conn: Option<SqliteConnection>,
    tables: HashSet<String>,
}

impl Executor {
    fn new(location: StoreLocation) -> Self {
        Executor {
            location,
            conn: None,
            tables: HashSet::new(),
        }
    }

    async fn connection(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        if self.conn.is_none() {
            let conn = open_connection(&self.location).await?;
            info!("Store opened ({:?})", self.location);
            self.conn = Some(conn);
        }
        self.conn.as_mut().ok_or(StoreError::Closed)
    }

    async fn prepare_table(&mut self, queue: &str) -> Result<(), StoreError> {
        if self.tables.contains(queue) {
            return Ok(());
        }
        let conn = self.connection().await?;
        queue::create_table(conn, queue).await?;
        self.tables.insert(queue.to_string());
        Ok(())
    }

    async fn has_table(&mut self, queue: &str) -> Result<bool, StoreError> {
        if self.tables.contains(queue) {
            return Ok(true);
        }
        let conn = self.connection().await?;
        let exists = queue::table_exists(conn, queue).await?;
        if exists {
            self.tables.insert(queue.to_string());
        }
        Ok(exists)
    }

    async fn add(&mut self, queue: &str, blobs: &[Vec<u8>], limit: u32) -> Result<(), StoreError> {
        if blobs.is_empty() {
            return Ok(());
        }
        self.prepare_table(queue).await?;
        let conn = self.connection().await?;
        let evicted = queue::insert_blobs(conn, queue, blobs, limit).await?;
        if evicted > 0 {
            debug!("Evicted {evicted} oldest record(s) from {queue} (limit {limit})");
        }
        Ok(())
    }

    async fn fetch(
        &mut self,
        queue: &str,
        max_count: usize,
        exclude: &HashSet<RecordId>,
    ) -> Result<Batch, StoreError> {
        self.prepare_table(queue).await?;
        let conn = self.connection().await?;
        let records = queue::fetch_records(conn, queue, max_count, exclude).await?;
        Ok(Batch { records })
    }

    async fn delete(&mut self, queue: &str, ids: &[RecordId]) -> Result<(), StoreError> {
        if ids.is_empty() || !self.has_table(queue).await? {
            return Ok(());
        }
        let conn = self.connection().await?;
        let deleted = queue::delete_records(conn, queue, ids).await?;
        debug!("Deleted {deleted} of {} record(s) from {queue}", ids.len());
        Ok(())
    }

    async fn count(&mut self, queue: &str) -> Result<u64, StoreError> {
        if !self.has_table(queue).await? {
            return Ok(0);
        }
        let conn = self.connection().await?;
        queue::count_records(conn, queue).await
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!("Error while closing store connection: {e}");
            }
        }
        self.tables.clear();
    }

    /// Logs a failed operation and forgets the queue's table so the next
    /// operation re-checks it.
    fn report<T>(&mut self, op: &str, queue: &str, result: &Result<T, StoreError>) {
        if let Err(e) = result {
            error!("Store {op} on {queue} failed: {e}");
            self.tables.remove(queue);
        }
    }
}

async fn run_executor(location: StoreLocation, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut executor = Executor::new(location);

    while let Some(command) = commands.recv().await {
        match command {
            Command::Add {
                queue,
                blobs,
                limit,
                reply,
            } => {
                let result = executor.add(&queue, &blobs, limit).await;
                executor.report("add", &queue, &result);
                let _ = reply.send(result);
            }
            Command::Fetch {
                queue,
                max_count,
                exclude,
                reply,
            } => {
                let result = executor.fetch(&queue, max_count, &exclude).await;
                executor.report("fetch", &queue, &result);
                let _ = reply.send(result);
            }
            Command::Delete { queue, ids, reply } => {
                let result = executor.delete(&queue, &ids).await;
                executor.report("delete", &queue, &result);
                let _ = reply.send(result);
            }
            Command::Count { queue, reply } => {
                let result = executor.count(&queue).await;
                executor.report("count", &queue, &result);
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                executor.close().await;
                let _ = reply.send(Ok(()));
                break;
            }
        }
    }

    debug!("Store executor stopped");
}
