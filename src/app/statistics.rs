//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{DeliveryStats, StatKind};

/// Prints every non-zero delivery counter to the log.
pub fn print_delivery_statistics(stats: &DeliveryStats) {
    info!("Delivery counters:");
    for kind in StatKind::iter() {
        let count = stats.get(kind);
        if count > 0 {
            info!("   {}: {}", kind.as_str(), count);
        }
    }
}

/// One-line summary of a run for the terminal.
pub fn summary_line(stats: &DeliveryStats, remaining: u64, elapsed_seconds: f64) -> String {
    let delivered = stats.get(StatKind::RecordsDelivered);
    format!(
        "✅ Delivered {} record{} ({} dropped, {} still queued) in {:.1}s",
        delivered,
        if delivered == 1 { "" } else { "s" },
        stats.get(StatKind::RecordsDropped),
        remaining,
        elapsed_seconds
    )
}
