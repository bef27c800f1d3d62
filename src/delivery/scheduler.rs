//! Batch scheduler.
//!
//! Turns "a record was just added" events into a single deferred flush signal.
//! While a flush is pending, further notifications are absorbed: the timer is
//! not reset, so a continuous stream of adds grows the batch instead of
//! starving it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::mpsc;

use crate::config::clamp_batching_delay;

/// Delay between "data available" and the flush.
///
/// Either fixed, or computed by a function evaluated each time the scheduler
/// arms. Both forms are clamped to `[0, 60]` seconds.
#[derive(Clone)]
pub enum BatchingDelay {
    Fixed(Duration),
    Dynamic(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl BatchingDelay {
    /// Builds a delay that is recomputed every time a flush is armed.
    pub fn dynamic(f: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        BatchingDelay::Dynamic(Arc::new(f))
    }

    /// Current delay, clamped to the supported window.
    pub fn resolve(&self) -> Duration {
        let raw = match self {
            BatchingDelay::Fixed(d) => *d,
            BatchingDelay::Dynamic(f) => f(),
        };
        clamp_batching_delay(raw)
    }
}

impl From<Duration> for BatchingDelay {
    fn from(d: Duration) -> Self {
        BatchingDelay::Fixed(d)
    }
}

impl fmt::Debug for BatchingDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchingDelay::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            BatchingDelay::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Receiving side of the scheduler: yields one item per flush to run.
#[derive(Debug)]
pub struct FlushSignals {
    rx: mpsc::UnboundedReceiver<()>,
    pending: Arc<AtomicBool>,
}

impl FlushSignals {
    /// Waits for the next flush trigger.
    ///
    /// Receiving a trigger re-opens the scheduler, so adds that happen from
    /// now on arm a new flush rather than piggybacking on this one.
    pub async fn recv(&mut self) -> Option<()> {
        let signal = self.rx.recv().await;
        self.pending.store(false, Ordering::SeqCst);
        signal
    }
}

/// Coalesces notifications into at most one pending flush per queue.
#[derive(Debug)]
pub struct BatchScheduler {
    delay: RwLock<BatchingDelay>,
    pending: Arc<AtomicBool>,
    trigger: mpsc::UnboundedSender<()>,
}

impl BatchScheduler {
    /// Creates a scheduler and the signal stream the delivery loop consumes.
    pub fn new(delay: BatchingDelay) -> (Self, FlushSignals) {
        let (trigger, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicBool::new(false));
        let scheduler = BatchScheduler {
            delay: RwLock::new(delay),
            pending: Arc::clone(&pending),
            trigger,
        };
        (scheduler, FlushSignals { rx, pending })
    }

    /// Replaces the batching delay. Takes effect the next time a flush is armed.
    pub fn set_delay(&self, delay: BatchingDelay) {
        match self.delay.write() {
            Ok(mut guard) => *guard = delay,
            Err(poisoned) => *poisoned.into_inner() = delay,
        }
    }

    /// The delay a flush armed right now would use.
    pub fn current_delay(&self) -> Duration {
        match self.delay.read() {
            Ok(guard) => guard.resolve(),
            Err(poisoned) => poisoned.into_inner().resolve(),
        }
    }

    /// Whether a flush is armed and not yet picked up.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// New data is available: arm a flush after the batching delay.
    pub fn notify(&self) {
        self.arm(self.current_delay());
    }

    /// A delivery failed: arm a flush after `after`, unless one is already armed.
    pub fn schedule_retry(&self, after: Duration) {
        self.arm(after);
    }

    /// Sends a trigger right away, even if a delayed flush is already armed.
    ///
    /// The armed flush still fires later and finds whatever is left.
    pub fn trigger_now(&self) {
        self.pending.store(true, Ordering::SeqCst);
        let _ = self.trigger.send(());
    }

    fn arm(&self, delay: Duration) {
        if self.pending.swap(true, Ordering::SeqCst) {
            trace!("Flush already pending, coalescing");
            return;
        }

        if delay.is_zero() {
            let _ = self.trigger.send(());
            return;
        }

        debug!("Flush armed in {:?}", delay);
        let trigger = self.trigger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = trigger.send(());
        });
    }
}
