//! Delivery statistics tracking.
//!
//! This module provides thread-safe counters for the pipeline: how many records
//! were enqueued, delivered, dropped, and how uploads went.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::StatKind;

/// Thread-safe delivery statistics tracker.
///
/// Every [`StatKind`] is initialized to zero on creation, so counters can be
/// bumped concurrently from the enqueue path and from overlapping flushes.
///
/// # Thread Safety
///
/// This struct is thread-safe and can be shared across multiple tasks using `Arc`.
#[derive(Debug)]
pub struct DeliveryStats {
    counters: HashMap<StatKind, AtomicUsize>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for kind in StatKind::iter() {
            counters.insert(kind, AtomicUsize::new(0));
        }
        DeliveryStats { counters }
    }

    /// Increment a counter by one.
    pub fn increment(&self, kind: StatKind) {
        self.add(kind, 1);
    }

    /// Increment a counter by `amount`.
    pub fn add(&self, kind: StatKind, amount: usize) {
        if let Some(counter) = self.counters.get(&kind) {
            counter.fetch_add(amount, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter for {:?} which is not in the map. \
                 This indicates a bug in DeliveryStats initialization.",
                kind
            );
        }
    }

    /// Get the current value of a counter.
    pub fn get(&self, kind: StatKind) -> usize {
        self.counters
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Snapshot of all counters in declaration order.
    pub fn snapshot(&self) -> Vec<(StatKind, usize)> {
        StatKind::iter().map(|k| (k, self.get(k))).collect()
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}
