// storage/mod.rs
// Durable store: per-queue SQLite tables behind one in-order executor

pub mod connection;
pub mod executor;
pub mod models;
pub mod pending;
pub mod queue;
mod test_helpers;

// Re-export commonly used items
pub use connection::StoreLocation;
pub use executor::Store;
pub use models::{Batch, Record, RecordId};
pub use pending::Pending;
pub use queue::validate_queue_name;
