//! Error handling and delivery statistics.
//!
//! This module provides:
//! - Error type definitions (store, upload, initialization)
//! - Delivery statistics tracking
//! - Categorization of transport errors into upload failures
//!
//! None of these errors ever cross the pipeline boundary as panics: store errors
//! are logged and turn the operation into a no-op, upload errors are reported
//! through the notification sink.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::categorize_reqwest_error;
pub use stats::DeliveryStats;
pub use types::{InitializationError, StatKind, StoreError, UploadError};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_delivery_stats_initialization() {
        let stats = DeliveryStats::new();
        for kind in StatKind::iter() {
            assert_eq!(stats.get(kind), 0);
        }
    }

    #[test]
    fn test_delivery_stats_increment() {
        let stats = DeliveryStats::new();
        stats.increment(StatKind::UploadAttempts);
        stats.increment(StatKind::UploadAttempts);
        stats.add(StatKind::RecordsDelivered, 16);
        assert_eq!(stats.get(StatKind::UploadAttempts), 2);
        assert_eq!(stats.get(StatKind::RecordsDelivered), 16);
        assert_eq!(stats.get(StatKind::UploadFailed), 0);
    }

    #[test]
    fn test_delivery_stats_snapshot_order() {
        let stats = DeliveryStats::new();
        stats.increment(StatKind::RecordsEnqueued);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), StatKind::iter().count());
        assert_eq!(snapshot[0], (StatKind::RecordsEnqueued, 1));
    }
}
